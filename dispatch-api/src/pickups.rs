use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{envelope, AppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SchedulePickupRequest {
    pub waybills: Vec<String>,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    pub pickup_location: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/pickups", post(schedule))
        .route("/v1/pickups/{pickup_id}/cancel", post(cancel))
}

/// POST /v1/pickups
/// Schedule a carrier pickup for a set of waybills. A billing-blocked
/// carrier answer comes back as status SCHEDULED_TEST, not an error.
async fn schedule(
    State(state): State<AppState>,
    Json(req): Json<SchedulePickupRequest>,
) -> Result<Json<Value>, AppError> {
    let pickup = state
        .scheduler
        .schedule(req.waybills, &req.date, &req.time, &req.pickup_location)
        .await?;
    Ok(envelope(pickup))
}

/// POST /v1/pickups/:pickup_id/cancel
/// Soft cancel; the record is retained with an audit note.
async fn cancel(
    State(state): State<AppState>,
    Path(pickup_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let pickup = state.scheduler.cancel(&pickup_id).await?;
    Ok(envelope(pickup))
}
