use crate::DispatchResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Named pickup location supplied by the warehouse registry
/// collaborator. Identity is the name; this core treats it as an
/// opaque key and never edits warehouse master data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub name: String,
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub phone: String,
    pub active: bool,
    /// Last status observed from the carrier for this location, kept in
    /// sync after carrier calls.
    #[serde(default)]
    pub last_carrier_status: Option<String>,
}

#[async_trait]
pub trait WarehouseRegistry: Send + Sync {
    async fn resolve(&self, name: &str) -> DispatchResult<Option<Warehouse>>;

    /// Record the latest carrier-observed status for a location.
    async fn record_carrier_status(&self, name: &str, status: &str) -> DispatchResult<()>;
}
