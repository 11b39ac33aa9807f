//! In-memory repositories and collaborator implementations, used in
//! tests and when running without a database.

use async_trait::async_trait;
use dispatch_core::order::{OrderGateway, OrderShipmentUpdate, OrderSnapshot};
use dispatch_core::warehouse::{Warehouse, WarehouseRegistry};
use dispatch_core::{DispatchError, DispatchResult};
use dispatch_shared::OrderRef;
use dispatch_shipment::models::{PickupRequest, ShipmentRecord};
use dispatch_shipment::repository::{PickupRepository, ShipmentRepository};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

fn guard<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
pub struct InMemoryShipmentRepository {
    records: Mutex<Vec<ShipmentRecord>>,
}

impl InMemoryShipmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ShipmentRecord> {
        guard(&self.records).clone()
    }
}

#[async_trait]
impl ShipmentRepository for InMemoryShipmentRepository {
    async fn begin_shipment(&self, record: ShipmentRecord) -> DispatchResult<()> {
        // Check and insert under one lock, mirroring the partial
        // unique index the Postgres store relies on.
        let mut records = guard(&self.records);
        if records
            .iter()
            .any(|r| r.order_id == record.order_id && r.state.is_live())
        {
            return Err(DispatchError::AlreadyExists(format!(
                "order {} already has a live shipment",
                record.order_id
            )));
        }
        records.push(record);
        Ok(())
    }

    async fn update(&self, record: &ShipmentRecord) -> DispatchResult<()> {
        let mut records = guard(&self.records);
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(DispatchError::NotFound(format!("shipment {}", record.id))),
        }
    }

    async fn get(&self, id: Uuid) -> DispatchResult<Option<ShipmentRecord>> {
        Ok(guard(&self.records).iter().find(|r| r.id == id).cloned())
    }

    async fn get_by_order(&self, order: &OrderRef) -> DispatchResult<Option<ShipmentRecord>> {
        Ok(guard(&self.records)
            .iter()
            .filter(|r| &r.order_id == order)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn get_by_waybill(&self, waybill: &str) -> DispatchResult<Option<ShipmentRecord>> {
        Ok(guard(&self.records)
            .iter()
            .find(|r| r.waybill_numbers.iter().any(|w| w == waybill))
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryPickupRepository {
    requests: Mutex<HashMap<String, PickupRequest>>,
}

impl InMemoryPickupRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PickupRepository for InMemoryPickupRepository {
    async fn create(&self, request: PickupRequest) -> DispatchResult<()> {
        let mut requests = guard(&self.requests);
        if requests.contains_key(&request.pickup_id) {
            return Err(DispatchError::AlreadyExists(format!(
                "pickup {}",
                request.pickup_id
            )));
        }
        requests.insert(request.pickup_id.clone(), request);
        Ok(())
    }

    async fn get(&self, pickup_id: &str) -> DispatchResult<Option<PickupRequest>> {
        Ok(guard(&self.requests).get(pickup_id).cloned())
    }

    async fn update(&self, request: &PickupRequest) -> DispatchResult<()> {
        let mut requests = guard(&self.requests);
        match requests.get_mut(&request.pickup_id) {
            Some(slot) => {
                *slot = request.clone();
                Ok(())
            }
            None => Err(DispatchError::NotFound(format!(
                "pickup {}",
                request.pickup_id
            ))),
        }
    }

    async fn active_for_waybill(&self, waybill: &str) -> DispatchResult<Option<PickupRequest>> {
        Ok(guard(&self.requests)
            .values()
            .find(|p| {
                p.status != dispatch_shipment::models::PickupStatus::Cancelled
                    && p.waybill_numbers.iter().any(|w| w == waybill)
            })
            .cloned())
    }
}

/// Order collaborator double: snapshots in, shipment updates recorded
/// for inspection.
#[derive(Default)]
pub struct InMemoryOrderGateway {
    orders: Mutex<HashMap<OrderRef, OrderSnapshot>>,
    updates: Mutex<Vec<(OrderRef, OrderShipmentUpdate)>>,
}

impl InMemoryOrderGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: OrderSnapshot) {
        guard(&self.orders).insert(snapshot.order_ref.clone(), snapshot);
    }

    pub fn updates_for(&self, order: &OrderRef) -> Vec<OrderShipmentUpdate> {
        guard(&self.updates)
            .iter()
            .filter(|(o, _)| o == order)
            .map(|(_, u)| u.clone())
            .collect()
    }
}

#[async_trait]
impl OrderGateway for InMemoryOrderGateway {
    async fn fetch(&self, order: &OrderRef) -> DispatchResult<Option<OrderSnapshot>> {
        Ok(guard(&self.orders).get(order).cloned())
    }

    async fn record_shipment(
        &self,
        order: &OrderRef,
        update: OrderShipmentUpdate,
    ) -> DispatchResult<()> {
        guard(&self.updates).push((order.clone(), update));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWarehouseRegistry {
    warehouses: Mutex<HashMap<String, Warehouse>>,
}

impl InMemoryWarehouseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(warehouses: Vec<Warehouse>) -> Self {
        let registry = Self::new();
        {
            let mut map = guard(&registry.warehouses);
            for w in warehouses {
                map.insert(w.name.clone(), w);
            }
        }
        registry
    }

    pub fn insert(&self, warehouse: Warehouse) {
        guard(&self.warehouses).insert(warehouse.name.clone(), warehouse);
    }
}

#[async_trait]
impl WarehouseRegistry for InMemoryWarehouseRegistry {
    async fn resolve(&self, name: &str) -> DispatchResult<Option<Warehouse>> {
        Ok(guard(&self.warehouses).get(name).cloned())
    }

    async fn record_carrier_status(&self, name: &str, status: &str) -> DispatchResult<()> {
        let mut warehouses = guard(&self.warehouses);
        if let Some(w) = warehouses.get_mut(name) {
            w.last_carrier_status = Some(status.to_string());
        }
        Ok(())
    }
}
