use crate::models::{PickupRequest, ShipmentRecord};
use async_trait::async_trait;
use dispatch_shared::OrderRef;
use dispatch_core::DispatchResult;
use uuid::Uuid;

/// Persistence seam for shipment records.
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    /// Insert a new record if and only if no live record exists for its
    /// order. The check-and-insert must be atomic (uniqueness
    /// constraint, not read-then-write); a live conflict is
    /// `AlreadyExists`.
    async fn begin_shipment(&self, record: ShipmentRecord) -> DispatchResult<()>;

    async fn update(&self, record: &ShipmentRecord) -> DispatchResult<()>;

    async fn get(&self, id: Uuid) -> DispatchResult<Option<ShipmentRecord>>;

    /// Most recent record for an order, live or not.
    async fn get_by_order(&self, order: &OrderRef) -> DispatchResult<Option<ShipmentRecord>>;

    async fn get_by_waybill(&self, waybill: &str) -> DispatchResult<Option<ShipmentRecord>>;
}

/// Persistence seam for pickup requests.
#[async_trait]
pub trait PickupRepository: Send + Sync {
    async fn create(&self, request: PickupRequest) -> DispatchResult<()>;

    async fn get(&self, pickup_id: &str) -> DispatchResult<Option<PickupRequest>>;

    async fn update(&self, request: &PickupRequest) -> DispatchResult<()>;

    /// The non-cancelled pickup a waybill currently belongs to, if any.
    /// Invariant: at most one such pickup exists per waybill.
    async fn active_for_waybill(&self, waybill: &str) -> DispatchResult<Option<PickupRequest>>;
}
