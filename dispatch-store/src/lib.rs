pub mod app_config;
pub mod database;
pub mod memory;
pub mod pickup_repo;
pub mod shipment_repo;

pub use database::DbClient;
pub use memory::{
    InMemoryOrderGateway, InMemoryPickupRepository, InMemoryShipmentRepository,
    InMemoryWarehouseRegistry,
};
pub use pickup_repo::PgPickupRepository;
pub use shipment_repo::PgShipmentRepository;
