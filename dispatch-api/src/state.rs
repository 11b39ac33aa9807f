use crate::middleware::resiliency::CircuitBreaker;
use dispatch_shipment::repository::ShipmentRepository;
use dispatch_shipment::{PickupScheduler, ShipmentOrchestrator, TrackingReconciler};
use dispatch_waybill::{WaybillAllocator, WaybillInventory};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<WaybillInventory>,
    pub allocator: Arc<WaybillAllocator>,
    pub orchestrator: Arc<ShipmentOrchestrator>,
    pub scheduler: Arc<PickupScheduler>,
    pub reconciler: Arc<TrackingReconciler>,
    pub shipments: Arc<dyn ShipmentRepository>,
    pub resiliency: Arc<Resiliency>,
}

/// Shared breakers guarding carrier-facing routes.
pub struct Resiliency {
    pub carrier_cb: CircuitBreaker,
}

impl Resiliency {
    pub fn new() -> Self {
        Self {
            carrier_cb: CircuitBreaker::new("carrier", 5, std::time::Duration::from_secs(30)),
        }
    }
}

impl Default for Resiliency {
    fn default() -> Self {
        Self::new()
    }
}
