use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use dispatch_shared::ScanEvent;
use serde_json::Value;

use crate::error::{envelope, AppError};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tracking/{waybill}", get(reconcile))
        .route("/v1/tracking/ingest", post(ingest))
}

/// GET /v1/tracking/:waybill
/// Pull the carrier's scans and fold them into the shipment record.
async fn reconcile(
    State(state): State<AppState>,
    Path(waybill): Path<String>,
) -> Result<Json<Value>, AppError> {
    let record = state.reconciler.reconcile(&waybill).await?;
    Ok(envelope(record))
}

/// POST /v1/tracking/ingest
/// Push one scan event (e.g. from a carrier webhook relay).
async fn ingest(
    State(state): State<AppState>,
    Json(scan): Json<ScanEvent>,
) -> Result<Json<Value>, AppError> {
    let record = state.reconciler.ingest(scan).await?;
    Ok(envelope(record))
}
