//! End-to-end orchestration behavior over the in-memory stores and a
//! scripted carrier double.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use dispatch_core::carrier::{
    CarrierApi, CarrierPickupResponse, CarrierShipmentResponse, PackageOutcome, PickupPayload,
    ShipmentPayload,
};
use dispatch_core::order::{Address, OrderLine, OrderSnapshot, OrderStatus};
use dispatch_core::warehouse::Warehouse;
use dispatch_core::{DispatchError, DispatchResult};
use dispatch_shared::ScanEvent;
use dispatch_shipment::models::{
    PaymentMode, PickupStatus, ShipmentRecord, ShipmentState, ShipmentRequest, ShipmentType,
    ShippingMode,
};
use dispatch_shipment::repository::{PickupRepository, ShipmentRepository};
use dispatch_shipment::{PickupScheduler, ShipmentOrchestrator, TrackingReconciler};
use dispatch_store::{
    InMemoryOrderGateway, InMemoryPickupRepository, InMemoryShipmentRepository,
    InMemoryWarehouseRegistry,
};
use dispatch_waybill::{
    AllocatorLimits, WaybillAllocator, WaybillInventory, WaybillSource, WaybillStatus,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
enum ShipmentScript {
    Accept,
    Reject(&'static str),
    Fail(&'static str),
}

#[derive(Clone)]
enum PickupScript {
    Accept,
    Fail(&'static str),
}

struct ScriptedCarrier {
    shipment: ShipmentScript,
    pickup: PickupScript,
    pickup_seq: AtomicI64,
    scans: Mutex<Vec<ScanEvent>>,
}

impl ScriptedCarrier {
    fn new(shipment: ShipmentScript, pickup: PickupScript) -> Self {
        Self {
            shipment,
            pickup,
            pickup_seq: AtomicI64::new(424242),
            scans: Mutex::new(Vec::new()),
        }
    }

    fn with_scans(self, scans: Vec<ScanEvent>) -> Self {
        *self.scans.lock().unwrap() = scans;
        self
    }
}

#[async_trait]
impl CarrierApi for ScriptedCarrier {
    async fn generate_waybills(&self, count: u32) -> DispatchResult<Vec<String>> {
        Ok((0..count).map(|i| format!("GEN{:010}", i)).collect())
    }

    async fn fetch_waybill(&self) -> DispatchResult<String> {
        Ok("GEN0000000001".into())
    }

    async fn create_shipment(
        &self,
        payload: &ShipmentPayload,
    ) -> DispatchResult<CarrierShipmentResponse> {
        match &self.shipment {
            ShipmentScript::Accept => Ok(CarrierShipmentResponse {
                success: true,
                packages: vec![PackageOutcome {
                    waybill: Some(payload.shipments[0].waybill.clone()),
                    status: Some("Success".into()),
                    rmk: None,
                }],
                rmk: None,
            }),
            ShipmentScript::Reject(remark) => Ok(CarrierShipmentResponse {
                success: false,
                packages: vec![PackageOutcome {
                    waybill: None,
                    status: Some("Fail".into()),
                    rmk: Some((*remark).into()),
                }],
                rmk: None,
            }),
            ShipmentScript::Fail(message) => {
                Err(DispatchError::ValidationError((*message).into()))
            }
        }
    }

    async fn create_pickup(
        &self,
        _payload: &PickupPayload,
    ) -> DispatchResult<CarrierPickupResponse> {
        match &self.pickup {
            PickupScript::Accept => Ok(CarrierPickupResponse {
                pickup_id: Some(self.pickup_seq.fetch_add(1, Ordering::Relaxed)),
                incoming_center_name: Some("DEL_Main".into()),
                extra: serde_json::json!({}),
            }),
            PickupScript::Fail(message) => Err(DispatchError::ValidationError((*message).into())),
        }
    }

    async fn track(&self, waybill: &str) -> DispatchResult<Vec<ScanEvent>> {
        Ok(self
            .scans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.waybill == waybill)
            .cloned()
            .collect())
    }
}

struct Stack {
    inventory: Arc<WaybillInventory>,
    shipments: Arc<InMemoryShipmentRepository>,
    pickups: Arc<InMemoryPickupRepository>,
    orders: Arc<InMemoryOrderGateway>,
    orchestrator: ShipmentOrchestrator,
    scheduler: PickupScheduler,
    reconciler: TrackingReconciler,
}

fn stack(carrier: ScriptedCarrier) -> Stack {
    let carrier: Arc<dyn CarrierApi> = Arc::new(carrier);
    let inventory = Arc::new(WaybillInventory::new());
    let allocator = Arc::new(WaybillAllocator::new(
        inventory.clone(),
        carrier.clone(),
        AllocatorLimits::default(),
    ));
    let shipments = Arc::new(InMemoryShipmentRepository::new());
    let pickups = Arc::new(InMemoryPickupRepository::new());
    let orders = Arc::new(InMemoryOrderGateway::new());
    let warehouses = Arc::new(InMemoryWarehouseRegistry::seeded(vec![Warehouse {
        name: "wh-main".into(),
        address: "Plot 12".into(),
        city: "New Delhi".into(),
        pincode: "110020".into(),
        phone: "9810000000".into(),
        active: true,
        last_carrier_status: None,
    }]));

    let orchestrator = ShipmentOrchestrator::new(
        shipments.clone(),
        orders.clone(),
        warehouses.clone(),
        allocator.clone(),
        carrier.clone(),
    );
    let scheduler = PickupScheduler::new(pickups.clone(), warehouses, carrier.clone());
    let reconciler = TrackingReconciler::new(shipments.clone(), carrier);

    Stack {
        inventory,
        shipments,
        pickups,
        orders,
        orchestrator,
        scheduler,
        reconciler,
    }
}

fn order(total: f64) -> OrderSnapshot {
    OrderSnapshot {
        order_ref: "ORD1".into(),
        status: OrderStatus::Confirmed,
        items: vec![OrderLine {
            name: "Electric Kettle".into(),
            quantity: 1,
            unit_price: total,
        }],
        address: Address {
            name: "Asha Rao".into(),
            line1: "14 MG Road".into(),
            city: Some("Bengaluru".into()),
            state: Some("Karnataka".into()),
            zip_code: Some("560001".into()),
            phone: Some("9000000000".into()),
            ..Address::default()
        },
    }
}

fn shipment_request(payment_mode: PaymentMode) -> ShipmentRequest {
    ShipmentRequest {
        order_id: "ORD1".into(),
        shipment_type: ShipmentType::Forward,
        pickup_location: "wh-main".into(),
        shipping_mode: ShippingMode::Surface,
        payment_mode,
        weight: Some(0.8),
        dimensions: None,
        packages: vec![],
    }
}

#[tokio::test]
async fn test_happy_path_cod_shipment() {
    let s = stack(ScriptedCarrier::new(
        ShipmentScript::Accept,
        PickupScript::Accept,
    ));
    s.orders.insert(order(599.0));
    s.inventory.store(&["WB100".to_string()], WaybillSource::Stored);

    let record = s
        .orchestrator
        .create_shipment(shipment_request(PaymentMode::Cod))
        .await
        .unwrap();

    assert_eq!(record.state, ShipmentState::Created);
    assert_eq!(record.waybill_numbers, vec!["WB100".to_string()]);
    assert_eq!(s.inventory.status("WB100"), Some(WaybillStatus::Used));

    let updates = s.orders.updates_for(&"ORD1".into());
    assert_eq!(updates.len(), 1);
    assert!(updates[0].shipment_created);
    assert_eq!(updates[0].waybill_number.as_deref(), Some("WB100"));
    assert_eq!(updates[0].new_status, Some(OrderStatus::Processing));
}

#[tokio::test]
async fn test_second_shipment_for_order_conflicts() {
    let s = stack(ScriptedCarrier::new(
        ShipmentScript::Accept,
        PickupScript::Accept,
    ));
    s.orders.insert(order(599.0));
    s.inventory.store(
        &["WB100".to_string(), "WB101".to_string()],
        WaybillSource::Stored,
    );

    s.orchestrator
        .create_shipment(shipment_request(PaymentMode::Cod))
        .await
        .unwrap();
    let err = s
        .orchestrator
        .create_shipment(shipment_request(PaymentMode::Cod))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::AlreadyExists(_)));
    let live: Vec<ShipmentRecord> = s
        .shipments
        .all()
        .into_iter()
        .filter(|r| r.state.is_live())
        .collect();
    assert_eq!(live.len(), 1);
    // The second attempt claimed nothing: WB101 is untouched.
    assert_eq!(s.inventory.status("WB101"), Some(WaybillStatus::Available));
}

#[tokio::test]
async fn test_carrier_error_releases_waybill() {
    let s = stack(ScriptedCarrier::new(
        ShipmentScript::Fail("Missing mandatory field cod_amount"),
        PickupScript::Accept,
    ));
    s.orders.insert(order(599.0));
    s.inventory.store(&["WB100".to_string()], WaybillSource::Stored);

    let err = s
        .orchestrator
        .create_shipment(shipment_request(PaymentMode::Cod))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::ValidationError(_)));
    assert_eq!(s.inventory.status("WB100"), Some(WaybillStatus::Available));

    let record = s
        .shipments
        .get_by_order(&"ORD1".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.state, ShipmentState::Failed);
}

#[tokio::test]
async fn test_logical_rejection_keeps_remark_and_allows_retry() {
    let s = stack(ScriptedCarrier::new(
        ShipmentScript::Reject("Pin code 999999 is not serviceable"),
        PickupScript::Accept,
    ));
    s.orders.insert(order(599.0));
    s.inventory.store(&["WB100".to_string()], WaybillSource::Stored);

    let record = s
        .orchestrator
        .create_shipment(shipment_request(PaymentMode::Cod))
        .await
        .unwrap();

    assert_eq!(record.state, ShipmentState::Failed);
    assert_eq!(
        record.failure_remark.as_deref(),
        Some("Pin code 999999 is not serviceable")
    );
    // The order was not flipped, so the operator can retry.
    assert!(s.orders.updates_for(&"ORD1".into()).is_empty());
    assert_eq!(s.inventory.status("WB100"), Some(WaybillStatus::Available));

    // The failed record does not block a retry; this carrier rejects
    // again, so the retry also lands as a second Failed record.
    let retry = s
        .orchestrator
        .create_shipment(shipment_request(PaymentMode::Cod))
        .await
        .unwrap();
    assert_eq!(retry.state, ShipmentState::Failed);
    assert_ne!(retry.id, record.id);
}

#[tokio::test]
async fn test_local_fallback_waybill_is_refused_for_real_shipments() {
    struct Unreachable;

    #[async_trait]
    impl CarrierApi for Unreachable {
        async fn generate_waybills(&self, _count: u32) -> DispatchResult<Vec<String>> {
            Err(DispatchError::Configuration("carrier API token is not set".into()))
        }
        async fn fetch_waybill(&self) -> DispatchResult<String> {
            Err(DispatchError::Configuration("carrier API token is not set".into()))
        }
        async fn create_shipment(
            &self,
            _payload: &ShipmentPayload,
        ) -> DispatchResult<CarrierShipmentResponse> {
            Err(DispatchError::Configuration("carrier API token is not set".into()))
        }
        async fn create_pickup(
            &self,
            _payload: &PickupPayload,
        ) -> DispatchResult<CarrierPickupResponse> {
            Err(DispatchError::Configuration("carrier API token is not set".into()))
        }
        async fn track(&self, _waybill: &str) -> DispatchResult<Vec<ScanEvent>> {
            Err(DispatchError::Configuration("carrier API token is not set".into()))
        }
    }

    let carrier: Arc<dyn CarrierApi> = Arc::new(Unreachable);
    let inventory = Arc::new(WaybillInventory::new());
    let allocator = Arc::new(WaybillAllocator::new(
        inventory.clone(),
        carrier.clone(),
        AllocatorLimits::default(),
    ));
    let shipments = Arc::new(InMemoryShipmentRepository::new());
    let orders = Arc::new(InMemoryOrderGateway::new());
    let warehouses = Arc::new(InMemoryWarehouseRegistry::seeded(vec![Warehouse {
        name: "wh-main".into(),
        address: "Plot 12".into(),
        city: "New Delhi".into(),
        pincode: "110020".into(),
        phone: "9810000000".into(),
        active: true,
        last_carrier_status: None,
    }]));
    let orchestrator = ShipmentOrchestrator::new(
        shipments,
        orders.clone(),
        warehouses,
        allocator,
        carrier,
    );

    orders.insert(order(599.0));
    let err = orchestrator
        .create_shipment(shipment_request(PaymentMode::Cod))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(_)));
    // The fallback code went back to the pool rather than staying
    // Reserved forever.
    assert_eq!(inventory.counts().reserved, 0);
}

#[tokio::test]
async fn test_wallet_balance_failure_degrades_pickup() {
    let s = stack(ScriptedCarrier::new(
        ShipmentScript::Accept,
        PickupScript::Fail("Insufficient balance in wallet, please recharge"),
    ));

    let pickup = s
        .scheduler
        .schedule(vec!["WB100".into()], "2026-09-01", "14:30", "wh-main")
        .await
        .unwrap();

    assert_eq!(pickup.status, PickupStatus::ScheduledTest);
    assert!(pickup.pickup_id.starts_with("TEST-"));
    assert!(!pickup.notes.is_empty());
}

#[tokio::test]
async fn test_other_pickup_failures_propagate() {
    let s = stack(ScriptedCarrier::new(
        ShipmentScript::Accept,
        PickupScript::Fail("Pickup slot not available"),
    ));

    let err = s
        .scheduler
        .schedule(vec!["WB100".into()], "2026-09-01", "14:30", "wh-main")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::ValidationError(_)));
}

#[tokio::test]
async fn test_pickup_validation_rejects_bad_inputs() {
    let s = stack(ScriptedCarrier::new(
        ShipmentScript::Accept,
        PickupScript::Accept,
    ));

    for (waybills, date, time) in [
        (vec![], "2026-09-01", "14:30"),
        (vec!["WB100".to_string()], "01-09-2026", "14:30"),
        (vec!["WB100".to_string()], "2026-09-01", "2pm"),
    ] {
        let err = s
            .scheduler
            .schedule(waybills, date, time, "wh-main")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgument(_)));
    }
}

#[tokio::test]
async fn test_cancel_is_soft_and_waybill_reuse_is_blocked_until_then() {
    let s = stack(ScriptedCarrier::new(
        ShipmentScript::Accept,
        PickupScript::Accept,
    ));

    let pickup = s
        .scheduler
        .schedule(vec!["WB100".into()], "2026-09-01", "14:30", "wh-main")
        .await
        .unwrap();

    // Same waybill cannot join a second live pickup.
    let err = s
        .scheduler
        .schedule(vec!["WB100".into()], "2026-09-02", "10:00", "wh-main")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AlreadyExists(_)));

    let cancelled = s.scheduler.cancel(&pickup.pickup_id).await.unwrap();
    assert_eq!(cancelled.status, PickupStatus::Cancelled);
    assert!(cancelled.notes.iter().any(|n| n.contains("cancelled")));
    // The record is retained.
    assert!(s.pickups.get(&pickup.pickup_id).await.unwrap().is_some());

    // After cancellation the waybill is free for a new pickup.
    s.scheduler
        .schedule(vec!["WB100".into()], "2026-09-02", "10:00", "wh-main")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_tracking_ingest_is_idempotent() {
    let s = stack(ScriptedCarrier::new(
        ShipmentScript::Accept,
        PickupScript::Accept,
    ));
    s.orders.insert(order(599.0));
    s.inventory.store(&["WB100".to_string()], WaybillSource::Stored);
    s.orchestrator
        .create_shipment(shipment_request(PaymentMode::Prepaid))
        .await
        .unwrap();

    let scan = ScanEvent {
        waybill: "WB100".into(),
        status: "Dispatched".into(),
        scanned_at: Utc.with_ymd_and_hms(2026, 9, 2, 9, 0, 0).unwrap(),
        location: Some("DEL_Hub".into()),
        remark: None,
    };

    let record = s.reconciler.ingest(scan.clone()).await.unwrap();
    assert_eq!(record.state, ShipmentState::Dispatched);
    assert_eq!(record.scans.len(), 1);

    let record = s.reconciler.ingest(scan).await.unwrap();
    assert_eq!(record.scans.len(), 1, "duplicate scan must not duplicate history");
}

#[tokio::test]
async fn test_reconcile_pulls_and_folds_scans() {
    let carrier = ScriptedCarrier::new(ShipmentScript::Accept, PickupScript::Accept).with_scans(
        vec![
            ScanEvent {
                waybill: "WB100".into(),
                status: "In Transit".into(),
                scanned_at: Utc.with_ymd_and_hms(2026, 9, 2, 9, 0, 0).unwrap(),
                location: None,
                remark: None,
            },
            ScanEvent {
                waybill: "WB100".into(),
                status: "Delivered".into(),
                scanned_at: Utc.with_ymd_and_hms(2026, 9, 3, 17, 0, 0).unwrap(),
                location: None,
                remark: None,
            },
        ],
    );
    let s = stack(carrier);
    s.orders.insert(order(599.0));
    s.inventory.store(&["WB100".to_string()], WaybillSource::Stored);
    s.orchestrator
        .create_shipment(shipment_request(PaymentMode::Prepaid))
        .await
        .unwrap();

    let record = s.reconciler.reconcile("WB100").await.unwrap();
    assert_eq!(record.state, ShipmentState::Delivered);
    assert_eq!(record.scans.len(), 2);

    // Reconciling again changes nothing.
    let record = s.reconciler.reconcile("WB100").await.unwrap();
    assert_eq!(record.scans.len(), 2);
}
