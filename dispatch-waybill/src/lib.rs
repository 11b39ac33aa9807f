pub mod allocator;
pub mod inventory;
pub mod models;

pub use allocator::{AllocatorLimits, WaybillAllocator};
pub use inventory::{InventoryError, WaybillInventory};
pub use models::{Waybill, WaybillSource, WaybillStatus};
