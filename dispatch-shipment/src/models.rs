use chrono::{DateTime, Utc};
use dispatch_shared::{OrderRef, ScanEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shipment direction/kind as understood by the carrier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentType {
    Forward,
    Reverse,
    Replacement,
    Mps,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingMode {
    Surface,
    Express,
}

impl ShippingMode {
    /// Vocabulary the carrier payload expects.
    pub fn as_carrier_str(&self) -> &'static str {
        match self {
            ShippingMode::Surface => "Surface",
            ShippingMode::Express => "Express",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    Cod,
    Prepaid,
}

impl PaymentMode {
    pub fn as_carrier_str(&self) -> &'static str {
        match self {
            PaymentMode::Cod => "COD",
            PaymentMode::Prepaid => "Prepaid",
        }
    }
}

/// Shipment lifecycle. Cancellation is a state, never a deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentState {
    Pending,
    Created,
    Failed,
    Dispatched,
    Delivered,
    Cancelled,
}

impl ShipmentState {
    /// Whether a record in this state blocks a new shipment for the
    /// same order. Failed attempts do not: retry must stay possible.
    pub fn is_live(&self) -> bool {
        !matches!(self, ShipmentState::Cancelled | ShipmentState::Failed)
    }

    /// Forward-progress rank used when applying tracking scans.
    fn rank(&self) -> u8 {
        match self {
            ShipmentState::Pending => 0,
            ShipmentState::Failed => 0,
            ShipmentState::Created => 1,
            ShipmentState::Dispatched => 2,
            ShipmentState::Delivered => 3,
            ShipmentState::Cancelled => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// One physical package inside a shipment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSpec {
    pub description: String,
    pub quantity: u32,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Ephemeral input to shipment creation; constructed per call, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub order_id: OrderRef,
    pub shipment_type: ShipmentType,
    /// Opaque warehouse registry key.
    pub pickup_location: String,
    pub shipping_mode: ShippingMode,
    pub payment_mode: PaymentMode,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
}

/// Persistent record of one shipment attempt for an order. At most one
/// live (non-cancelled, non-failed) forward record may exist per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub id: Uuid,
    pub order_id: OrderRef,
    pub waybill_numbers: Vec<String>,
    pub pickup_location: String,
    pub shipping_mode: ShippingMode,
    pub shipment_type: ShipmentType,
    pub state: ShipmentState,
    pub carrier_response: Option<serde_json::Value>,
    /// Carrier remark from a failed attempt, verbatim.
    pub failure_remark: Option<String>,
    pub scans: Vec<ScanEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShipmentRecord {
    pub fn pending(request: &ShipmentRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id: request.order_id.clone(),
            waybill_numbers: Vec::new(),
            pickup_location: request.pickup_location.clone(),
            shipping_mode: request.shipping_mode,
            shipment_type: request.shipment_type,
            state: ShipmentState::Pending,
            carrier_response: None,
            failure_remark: None,
            scans: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_created(&mut self, waybill: String, response: serde_json::Value) {
        self.waybill_numbers = vec![waybill];
        self.state = ShipmentState::Created;
        self.carrier_response = Some(response);
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, remark: String, response: Option<serde_json::Value>) {
        self.state = ShipmentState::Failed;
        self.failure_remark = Some(remark);
        self.carrier_response = response;
        self.updated_at = Utc::now();
    }

    /// Record a scan if it is new; returns whether it was added.
    /// Identity is (waybill, timestamp, status) so re-ingestion of the
    /// same scan never duplicates history.
    pub fn add_scan(&mut self, scan: ScanEvent) -> bool {
        let key = scan.dedup_key();
        if self.scans.iter().any(|s| s.dedup_key() == key) {
            return false;
        }
        self.scans.push(scan);
        self.updated_at = Utc::now();
        true
    }

    /// Move the state forward if the incoming state outranks the
    /// current one. Tracking never regresses a record, and Failed,
    /// Delivered and Cancelled are terminal: a late RTO or cancellation
    /// scan must not rewrite a completed delivery.
    pub fn advance(&mut self, next: ShipmentState) -> bool {
        if matches!(
            self.state,
            ShipmentState::Failed | ShipmentState::Delivered | ShipmentState::Cancelled
        ) {
            return false;
        }
        if next.rank() > self.state.rank() {
            self.state = next;
            self.updated_at = Utc::now();
            return true;
        }
        false
    }
}

/// Pickup request lifecycle. ScheduledTest marks a pickup recorded
/// locally only, because the carrier refused it on billing grounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PickupStatus {
    Scheduled,
    ScheduledTest,
    InProgress,
    Completed,
    Cancelled,
}

/// A scheduled carrier visit to collect a set of waybill-tagged
/// packages. Retained forever; cancellation is a state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupRequest {
    pub pickup_id: String,
    pub waybill_numbers: Vec<String>,
    pub pickup_location: String,
    pub scheduled_date: String,
    pub scheduled_time: String,
    pub status: PickupStatus,
    pub carrier_response: Option<serde_json::Value>,
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PickupRequest {
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
        self.updated_at = Utc::now();
    }
}

/// Local tracking vocabulary mapped from carrier scan statuses.
/// Anything unrecognized is Unknown so a carrier vocabulary change
/// never crashes reconciliation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingStatus {
    PickupScheduled,
    Dispatched,
    InTransit,
    Delivered,
    Cancelled,
    Unknown,
}

impl TrackingStatus {
    pub fn from_carrier(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pickup scheduled" | "manifested" | "scheduled" => TrackingStatus::PickupScheduled,
            "dispatched" | "out for delivery" => TrackingStatus::Dispatched,
            "in transit" => TrackingStatus::InTransit,
            "delivered" => TrackingStatus::Delivered,
            "cancelled" | "canceled" | "rto" => TrackingStatus::Cancelled,
            _ => TrackingStatus::Unknown,
        }
    }

    /// Shipment state implied by this tracking status, if any.
    pub fn shipment_state(&self) -> Option<ShipmentState> {
        match self {
            TrackingStatus::PickupScheduled => Some(ShipmentState::Created),
            TrackingStatus::Dispatched | TrackingStatus::InTransit => {
                Some(ShipmentState::Dispatched)
            }
            TrackingStatus::Delivered => Some(ShipmentState::Delivered),
            TrackingStatus::Cancelled => Some(ShipmentState::Cancelled),
            TrackingStatus::Unknown => None,
        }
    }
}
