use crate::DispatchResult;
use async_trait::async_trait;
use dispatch_shared::OrderRef;
use serde::{Deserialize, Serialize};

/// Order lifecycle states as seen by this core. The full lifecycle is
/// owned by the order collaborator; shipment creation is only allowed
/// from Confirmed or Processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn allows_shipment(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Processing)
    }
}

/// Delivery address as stored by the order collaborator. Some upstream
/// sources write `zip_code`, others `postal_code`; both are carried and
/// resolved in one place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Address {
    /// Resolve the zip/postal fallback before payload construction.
    pub fn resolved_pincode(&self) -> Option<&str> {
        self.zip_code
            .as_deref()
            .filter(|z| !z.is_empty())
            .or_else(|| self.postal_code.as_deref().filter(|z| !z.is_empty()))
    }
}

/// One order line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl OrderLine {
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// Read-side snapshot of an order, fetched once per shipment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_ref: OrderRef,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub address: Address,
}

impl OrderSnapshot {
    /// Sum of line totals, unrounded; rounding happens at payload time.
    pub fn total_amount(&self) -> f64 {
        self.items.iter().map(|i| i.line_total()).sum()
    }
}

/// Shipment outcome written back onto the order after a carrier call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderShipmentUpdate {
    pub shipment_created: bool,
    pub shipment_status: String,
    pub waybill_number: Option<String>,
    pub shipment_details: serde_json::Value,
    pub new_status: Option<OrderStatus>,
}

/// Seam to the order collaborator: read the snapshot, write the
/// shipment flags. The order store itself is out of scope.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn fetch(&self, order: &OrderRef) -> DispatchResult<Option<OrderSnapshot>>;

    async fn record_shipment(
        &self,
        order: &OrderRef,
        update: OrderShipmentUpdate,
    ) -> DispatchResult<()>;
}
