use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{envelope, AppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub count: u32,
    #[serde(default = "default_prefer_stored")]
    pub prefer_stored: bool,
}

fn default_prefer_stored() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub codes: Vec<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/waybills/allocate", post(allocate))
        .route("/v1/waybills/fetch", post(fetch))
        .route("/v1/waybills/store", post(store))
        .route("/v1/waybills/counts", get(counts))
}

/// POST /v1/waybills/allocate
/// Claim or generate waybills; returned codes are Reserved.
async fn allocate(
    State(state): State<AppState>,
    Json(req): Json<AllocateRequest>,
) -> Result<Json<Value>, AppError> {
    let waybills = state
        .allocator
        .allocate(req.count, req.prefer_stored, None)
        .await?;
    Ok(envelope(waybills))
}

/// POST /v1/waybills/fetch
/// Fetch one carrier waybill, subject to the single-fetch window. The
/// returned code is Reserved in the pool.
async fn fetch(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let waybill = state.allocator.fetch_single(None).await?;
    Ok(envelope(waybill))
}

/// POST /v1/waybills/store
/// Seed the pool with pre-generated carrier codes.
async fn store(
    State(state): State<AppState>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<Value>, AppError> {
    let stored = state
        .inventory
        .store(&req.codes, dispatch_waybill::WaybillSource::Carrier);
    Ok(envelope(serde_json::json!({ "stored": stored })))
}

/// GET /v1/waybills/counts
async fn counts(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(envelope(state.inventory.counts()))
}

#[cfg(test)]
mod tests {
    use crate::state::{AppState, Resiliency};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use dispatch_core::carrier::{
        CarrierApi, CarrierPickupResponse, CarrierShipmentResponse, PickupPayload,
        ShipmentPayload,
    };
    use dispatch_core::{DispatchError, DispatchResult};
    use dispatch_shared::ScanEvent;
    use dispatch_shipment::{PickupScheduler, ShipmentOrchestrator, TrackingReconciler};
    use dispatch_store::{
        InMemoryOrderGateway, InMemoryPickupRepository, InMemoryShipmentRepository,
        InMemoryWarehouseRegistry,
    };
    use dispatch_waybill::{AllocatorLimits, WaybillAllocator, WaybillInventory, WaybillStatus};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct OneCodeCarrier;

    #[async_trait]
    impl CarrierApi for OneCodeCarrier {
        async fn generate_waybills(&self, _count: u32) -> DispatchResult<Vec<String>> {
            Ok(vec!["GEN0000000001".into()])
        }
        async fn fetch_waybill(&self) -> DispatchResult<String> {
            Ok("GEN0000000001".into())
        }
        async fn create_shipment(
            &self,
            _payload: &ShipmentPayload,
        ) -> DispatchResult<CarrierShipmentResponse> {
            Err(DispatchError::Internal("not under test".into()))
        }
        async fn create_pickup(
            &self,
            _payload: &PickupPayload,
        ) -> DispatchResult<CarrierPickupResponse> {
            Err(DispatchError::Internal("not under test".into()))
        }
        async fn track(&self, _waybill: &str) -> DispatchResult<Vec<ScanEvent>> {
            Ok(vec![])
        }
    }

    fn app_state() -> AppState {
        let carrier: Arc<dyn CarrierApi> = Arc::new(OneCodeCarrier);
        let inventory = Arc::new(WaybillInventory::new());
        let allocator = Arc::new(WaybillAllocator::new(
            inventory.clone(),
            carrier.clone(),
            AllocatorLimits::default(),
        ));
        let shipments = Arc::new(InMemoryShipmentRepository::new());
        let pickups = Arc::new(InMemoryPickupRepository::new());
        let orders = Arc::new(InMemoryOrderGateway::new());
        let warehouses = Arc::new(InMemoryWarehouseRegistry::new());

        AppState {
            inventory,
            allocator: allocator.clone(),
            orchestrator: Arc::new(ShipmentOrchestrator::new(
                shipments.clone(),
                orders,
                warehouses.clone(),
                allocator,
                carrier.clone(),
            )),
            scheduler: Arc::new(PickupScheduler::new(pickups, warehouses, carrier.clone())),
            reconciler: Arc::new(TrackingReconciler::new(shipments.clone(), carrier)),
            shipments,
            resiliency: Arc::new(Resiliency::new()),
        }
    }

    #[tokio::test]
    async fn test_fetch_route_reserves_a_carrier_code() {
        let state = app_state();
        let inventory = state.inventory.clone();
        let app = crate::app(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/waybills/fetch")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            inventory.status("GEN0000000001"),
            Some(WaybillStatus::Reserved)
        );
    }
}
