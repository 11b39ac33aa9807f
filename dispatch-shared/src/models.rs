use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to an order held by the order collaborator.
///
/// Order identity is owned by the surrounding commerce platform; this core
/// only threads the key through, so it stays a string rather than a Uuid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderRef(pub String);

impl OrderRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single tracking scan reported by the carrier for one waybill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub waybill: String,
    /// Carrier-side status vocabulary, verbatim (e.g. "In Transit").
    pub status: String,
    pub scanned_at: DateTime<Utc>,
    pub location: Option<String>,
    pub remark: Option<String>,
}

impl ScanEvent {
    /// Identity used for idempotent ingestion: re-ingesting the same
    /// (waybill, timestamp, status) tuple must not duplicate history.
    pub fn dedup_key(&self) -> (String, i64, String) {
        (
            self.waybill.clone(),
            self.scanned_at.timestamp(),
            self.status.clone(),
        )
    }
}
