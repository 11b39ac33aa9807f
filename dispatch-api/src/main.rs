use std::net::SocketAddr;
use std::sync::Arc;

use dispatch_api::{app, state::{AppState, Resiliency}};
use dispatch_carrier::{CarrierClient, CarrierConfig};
use dispatch_core::carrier::CarrierApi;
use dispatch_core::warehouse::Warehouse;
use dispatch_shipment::repository::{PickupRepository, ShipmentRepository};
use dispatch_shipment::{PickupScheduler, ShipmentOrchestrator, TrackingReconciler};
use dispatch_store::{
    DbClient, InMemoryOrderGateway, InMemoryPickupRepository, InMemoryShipmentRepository,
    InMemoryWarehouseRegistry, PgPickupRepository, PgShipmentRepository,
};
use dispatch_waybill::{AllocatorLimits, WaybillAllocator, WaybillInventory};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dispatch_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = dispatch_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Dispatch API on port {}", config.server.port);

    let carrier: Arc<dyn CarrierApi> = Arc::new(
        CarrierClient::new(CarrierConfig {
            endpoints: config.carrier.endpoints.clone(),
            token: config.carrier.token.clone(),
            timeout_secs: config.carrier.timeout_secs,
            max_attempts: config.carrier.max_attempts,
        })
        .expect("Failed to build carrier client"),
    );

    let inventory = Arc::new(WaybillInventory::new());
    let allocator = Arc::new(WaybillAllocator::new(
        inventory.clone(),
        carrier.clone(),
        AllocatorLimits {
            max_per_request: config.allocator.max_per_request,
            bulk_window_cap: config.allocator.bulk_window_cap,
            single_window_cap: config.allocator.single_window_cap,
            window: std::time::Duration::from_secs(config.allocator.window_secs),
        },
    ));

    let (shipments, pickups): (Arc<dyn ShipmentRepository>, Arc<dyn PickupRepository>) =
        if config.database.enabled {
            let db = DbClient::new(&config.database.url)
                .await
                .expect("Failed to connect to Postgres");
            db.migrate().await.expect("Failed to run migrations");
            (
                Arc::new(PgShipmentRepository::new(db.pool.clone())),
                Arc::new(PgPickupRepository::new(db.pool)),
            )
        } else {
            tracing::warn!("Database disabled; using in-memory repositories");
            (
                Arc::new(InMemoryShipmentRepository::new()),
                Arc::new(InMemoryPickupRepository::new()),
            )
        };

    let warehouses = Arc::new(InMemoryWarehouseRegistry::seeded(
        config
            .warehouses
            .iter()
            .map(|w| Warehouse {
                name: w.name.clone(),
                address: w.address.clone(),
                city: w.city.clone(),
                pincode: w.pincode.clone(),
                phone: w.phone.clone(),
                active: w.active,
                last_carrier_status: None,
            })
            .collect(),
    ));
    let orders = Arc::new(InMemoryOrderGateway::new());

    let orchestrator = Arc::new(ShipmentOrchestrator::new(
        shipments.clone(),
        orders,
        warehouses.clone(),
        allocator.clone(),
        carrier.clone(),
    ));
    let scheduler = Arc::new(PickupScheduler::new(
        pickups,
        warehouses,
        carrier.clone(),
    ));
    let reconciler = Arc::new(TrackingReconciler::new(shipments.clone(), carrier));

    let app_state = AppState {
        inventory,
        allocator,
        orchestrator,
        scheduler,
        reconciler,
        shipments,
        resiliency: Arc::new(Resiliency::new()),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
