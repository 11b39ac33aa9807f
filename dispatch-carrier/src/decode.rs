//! Typed decoding of carrier responses.
//!
//! Each endpoint has exactly one documented response shape; anything
//! else is a `Decode` error. No runtime property probing.

use chrono::{DateTime, NaiveDateTime, Utc};
use dispatch_core::carrier::{CarrierPickupResponse, CarrierShipmentResponse};
use dispatch_core::{DispatchError, DispatchResult};
use dispatch_shared::ScanEvent;
use serde::Deserialize;
use serde_json::Value;

/// Bulk generation returns a JSON string of comma-separated codes.
pub fn waybill_batch(value: &Value) -> DispatchResult<Vec<String>> {
    let raw: String = serde_json::from_value(value.clone())
        .map_err(|_| decode_err("bulk waybill response", value))?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

/// Single fetch returns a JSON string with one code.
pub fn single_waybill(value: &Value) -> DispatchResult<String> {
    let raw: String = serde_json::from_value(value.clone())
        .map_err(|_| decode_err("single waybill response", value))?;
    let code = raw.trim();
    if code.is_empty() {
        return Err(DispatchError::Decode(
            "carrier returned an empty waybill".into(),
        ));
    }
    Ok(code.to_string())
}

/// Shipment create returns the `{success, packages[], rmk}` envelope.
pub fn shipment_response(value: &Value) -> DispatchResult<CarrierShipmentResponse> {
    serde_json::from_value(value.clone()).map_err(|_| decode_err("shipment response", value))
}

/// Pickup create returns an object keyed by `pickup_id`.
pub fn pickup_response(value: &Value) -> DispatchResult<CarrierPickupResponse> {
    serde_json::from_value(value.clone()).map_err(|_| decode_err("pickup response", value))
}

#[derive(Deserialize)]
struct TrackEnvelope {
    #[serde(rename = "ShipmentData", default)]
    shipment_data: Vec<TrackShipment>,
}

#[derive(Deserialize)]
struct TrackShipment {
    #[serde(rename = "Shipment")]
    shipment: TrackDetail,
}

#[derive(Deserialize)]
struct TrackDetail {
    #[serde(rename = "Scans", default)]
    scans: Vec<TrackScan>,
}

#[derive(Deserialize)]
struct TrackScan {
    #[serde(rename = "ScanDetail")]
    detail: ScanDetail,
}

#[derive(Deserialize)]
struct ScanDetail {
    #[serde(rename = "Scan", default)]
    scan: Option<String>,
    #[serde(rename = "ScanDateTime", default)]
    scan_date_time: Option<String>,
    #[serde(rename = "ScannedLocation", default)]
    scanned_location: Option<String>,
    #[serde(rename = "Instructions", default)]
    instructions: Option<String>,
}

/// Tracking returns the carrier's `ShipmentData[].Shipment.Scans[]`
/// structure; it is flattened into our scan events.
pub fn tracking_scans(waybill: &str, value: &Value) -> DispatchResult<Vec<ScanEvent>> {
    let envelope: TrackEnvelope =
        serde_json::from_value(value.clone()).map_err(|_| decode_err("tracking response", value))?;

    let mut events = Vec::new();
    for shipment in envelope.shipment_data {
        for scan in shipment.shipment.scans {
            let detail = scan.detail;
            let status = match detail.scan {
                Some(s) if !s.is_empty() => s,
                _ => continue,
            };
            events.push(ScanEvent {
                waybill: waybill.to_string(),
                status,
                scanned_at: detail
                    .scan_date_time
                    .as_deref()
                    .and_then(parse_scan_time)
                    .unwrap_or_else(Utc::now),
                location: detail.scanned_location,
                remark: detail.instructions,
            });
        }
    }
    Ok(events)
}

/// Carrier timestamps arrive either RFC 3339 or as a bare
/// `YYYY-MM-DDTHH:MM:SS` local time.
fn parse_scan_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|t| t.and_utc())
}

fn decode_err(what: &str, value: &Value) -> DispatchError {
    DispatchError::Decode(format!("{} did not match the documented schema: {}", what, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_waybill_batch_decoding() {
        let value = json!("WB001, WB002,WB003");
        let codes = waybill_batch(&value).unwrap();
        assert_eq!(codes, vec!["WB001", "WB002", "WB003"]);
    }

    #[test]
    fn test_waybill_batch_rejects_wrong_shape() {
        let err = waybill_batch(&json!({"waybills": ["WB001"]})).unwrap_err();
        assert!(matches!(err, DispatchError::Decode(_)));
    }

    #[test]
    fn test_shipment_response_with_remark() {
        let value = json!({
            "success": false,
            "packages": [{"waybill": "WB001", "status": "Fail", "rmk": "Pin code not serviceable"}]
        });
        let resp = shipment_response(&value).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.remark(), Some("Pin code not serviceable"));
    }

    #[test]
    fn test_tracking_scan_flattening() {
        let value = json!({
            "ShipmentData": [{
                "Shipment": {
                    "Scans": [
                        {"ScanDetail": {"Scan": "In Transit", "ScanDateTime": "2026-03-01T10:00:00", "ScannedLocation": "Delhi_Hub"}},
                        {"ScanDetail": {"Scan": "Delivered", "ScanDateTime": "2026-03-02T16:30:00"}}
                    ]
                }
            }]
        });
        let scans = tracking_scans("WB001", &value).unwrap();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].status, "In Transit");
        assert_eq!(scans[0].location.as_deref(), Some("Delhi_Hub"));
        assert_eq!(scans[1].status, "Delivered");
        assert_eq!(scans[1].waybill, "WB001");
    }

    #[test]
    fn test_tracking_rejects_wrong_shape() {
        let err = tracking_scans("WB001", &json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, DispatchError::Decode(_)));
    }
}
