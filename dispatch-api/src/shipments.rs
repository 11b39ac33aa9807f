use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use dispatch_core::DispatchError;
use dispatch_shared::OrderRef;
use dispatch_shipment::ShipmentRequest;
use serde_json::Value;

use crate::error::{envelope, AppError};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/shipments", post(create_shipment))
        .route("/v1/shipments/{order_id}", get(get_shipment))
}

/// POST /v1/shipments
/// Create a carrier shipment for an order. A carrier-side logical
/// rejection still answers 200: the Failed record with the carrier's
/// remark is the operator's diagnostic.
async fn create_shipment(
    State(state): State<AppState>,
    Json(req): Json<ShipmentRequest>,
) -> Result<Json<Value>, AppError> {
    let record = state.orchestrator.create_shipment(req).await?;
    Ok(envelope(record))
}

/// GET /v1/shipments/:order_id
/// Latest shipment record for an order.
async fn get_shipment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let order = OrderRef::new(order_id);
    let record = state
        .shipments
        .get_by_order(&order)
        .await?
        .ok_or_else(|| DispatchError::NotFound(format!("no shipment for order {}", order)))?;
    Ok(envelope(record))
}
