pub mod models;
pub mod orchestrator;
pub mod pickup;
pub mod repository;
pub mod tracking;

pub use models::{
    PaymentMode, PickupRequest, PickupStatus, ShipmentRecord, ShipmentRequest, ShipmentState,
    ShipmentType, ShippingMode, TrackingStatus,
};
pub use orchestrator::ShipmentOrchestrator;
pub use pickup::PickupScheduler;
pub use repository::{PickupRepository, ShipmentRepository};
pub use tracking::TrackingReconciler;
