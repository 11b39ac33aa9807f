use crate::DispatchResult;
use async_trait::async_trait;
use dispatch_shared::ScanEvent;
use serde::{Deserialize, Serialize};

/// One package entry inside the carrier shipment-create payload.
///
/// Field names follow the carrier wire format; everything the carrier
/// treats as mandatory is non-optional here so a malformed payload is a
/// compile-time impossibility rather than a runtime 4xx.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentPackage {
    pub name: String,
    pub add: String,
    pub pin: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub phone: String,
    /// The operator-side order reference the carrier echoes back.
    pub order: String,
    pub payment_mode: String,
    /// Mandatory on every shipment: the collection amount as a string,
    /// "0" for prepaid. The carrier terminally rejects COD shipments
    /// that omit it, so it is never optional on our side.
    pub cod_amount: String,
    pub total_amount: String,
    pub products_desc: String,
    pub quantity: u32,
    pub waybill: String,
    pub shipment_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment_height: Option<f64>,
}

/// Full payload for `POST /api/cmu/create.json` (sent as the `data`
/// form field).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentPayload {
    pub shipments: Vec<ShipmentPackage>,
    pub pickup_location: PickupLocationRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupLocationRef {
    pub name: String,
}

/// Per-package outcome inside the carrier's shipment-create response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageOutcome {
    #[serde(default)]
    pub waybill: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Carrier remark, e.g. a non-serviceable-pincode diagnosis.
    /// Preserved verbatim for operators.
    #[serde(default, alias = "remarks")]
    pub rmk: Option<String>,
}

/// Decoded carrier shipment-create envelope.
///
/// A `success: false` here is a logical rejection delivered over a 2xx
/// response; it is data, not an error, so the orchestrator can persist
/// the failed attempt with the carrier's own remark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierShipmentResponse {
    pub success: bool,
    #[serde(default)]
    pub packages: Vec<PackageOutcome>,
    #[serde(default)]
    pub rmk: Option<String>,
}

impl CarrierShipmentResponse {
    /// First remark worth showing an operator, package-level preferred.
    pub fn remark(&self) -> Option<&str> {
        self.packages
            .iter()
            .find_map(|p| p.rmk.as_deref())
            .or(self.rmk.as_deref())
    }
}

/// Request body for `POST /fm/request/new/` (pickup creation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupPayload {
    pub pickup_location: String,
    pub pickup_date: String,
    pub pickup_time: String,
    pub expected_package_count: u32,
}

/// Decoded carrier pickup-create response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierPickupResponse {
    #[serde(default)]
    pub pickup_id: Option<i64>,
    #[serde(default)]
    pub incoming_center_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Seam between orchestration and the carrier HTTP client.
///
/// Orchestrators call this trait; tests substitute a mock.
#[async_trait]
pub trait CarrierApi: Send + Sync {
    /// Bulk-generate waybill codes. The carrier produces these in
    /// internal batches of 25 and may return fewer than asked.
    async fn generate_waybills(&self, count: u32) -> DispatchResult<Vec<String>>;

    /// Fetch a single waybill code.
    async fn fetch_waybill(&self) -> DispatchResult<String>;

    /// Create a shipment. Logical rejection comes back as
    /// `success: false` in the response, not as an `Err`.
    async fn create_shipment(
        &self,
        payload: &ShipmentPayload,
    ) -> DispatchResult<CarrierShipmentResponse>;

    /// Schedule a pickup visit.
    async fn create_pickup(&self, payload: &PickupPayload)
        -> DispatchResult<CarrierPickupResponse>;

    /// Fetch tracking scans for one waybill.
    async fn track(&self, waybill: &str) -> DispatchResult<Vec<ScanEvent>>;
}
