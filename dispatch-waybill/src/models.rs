use chrono::{DateTime, Utc};
use dispatch_shared::OrderRef;
use serde::{Deserialize, Serialize};

/// Waybill lifecycle. A code only ever moves
/// Available → Reserved → Used, or Reserved → Available on release.
/// Used is terminal; codes are never deleted, only marked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaybillStatus {
    Available,
    Reserved,
    Used,
}

/// Where a waybill code came from. Local-fallback codes are
/// syntactically valid but unknown to the carrier, so callers must not
/// put them on a real shipment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WaybillSource {
    Stored,
    Carrier,
    LocalFallback,
}

/// One carrier tracking code and its pool state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waybill {
    pub code: String,
    pub status: WaybillStatus,
    pub source: WaybillSource,
    pub generated_at: DateTime<Utc>,
    pub reserved_for: Option<OrderRef>,
}

impl Waybill {
    pub fn new(code: impl Into<String>, source: WaybillSource) -> Self {
        Self {
            code: code.into(),
            status: WaybillStatus::Available,
            source,
            generated_at: Utc::now(),
            reserved_for: None,
        }
    }
}
