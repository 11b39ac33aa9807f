use crate::models::{ShipmentRecord, TrackingStatus};
use crate::repository::ShipmentRepository;
use dispatch_core::carrier::CarrierApi;
use dispatch_core::{DispatchError, DispatchResult};
use dispatch_shared::ScanEvent;
use std::sync::Arc;

/// Maps carrier tracking scans onto local shipment state.
///
/// Ingestion is idempotent on (waybill, timestamp, status) and never
/// fails on unrecognized carrier vocabulary; unknown statuses land in
/// the scan history without a state transition.
pub struct TrackingReconciler {
    shipments: Arc<dyn ShipmentRepository>,
    carrier: Arc<dyn CarrierApi>,
}

impl TrackingReconciler {
    pub fn new(shipments: Arc<dyn ShipmentRepository>, carrier: Arc<dyn CarrierApi>) -> Self {
        Self { shipments, carrier }
    }

    /// Pull: fetch the carrier's scans for a waybill and fold them into
    /// the owning shipment record.
    pub async fn reconcile(&self, waybill: &str) -> DispatchResult<ShipmentRecord> {
        let scans = self.carrier.track(waybill).await?;

        let mut record = self.record_for(waybill).await?;
        let mut changed = false;
        for scan in scans {
            changed |= apply_scan(&mut record, scan);
        }
        if changed {
            self.shipments.update(&record).await?;
        }
        Ok(record)
    }

    /// Push: ingest one scan event delivered to us.
    pub async fn ingest(&self, scan: ScanEvent) -> DispatchResult<ShipmentRecord> {
        let mut record = self.record_for(&scan.waybill).await?;
        if apply_scan(&mut record, scan) {
            self.shipments.update(&record).await?;
        }
        Ok(record)
    }

    async fn record_for(&self, waybill: &str) -> DispatchResult<ShipmentRecord> {
        self.shipments
            .get_by_waybill(waybill)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("no shipment for waybill {}", waybill)))
    }
}

/// Returns whether the record changed.
fn apply_scan(record: &mut ShipmentRecord, scan: ScanEvent) -> bool {
    let status = TrackingStatus::from_carrier(&scan.status);
    let added = record.add_scan(scan);
    if !added {
        return false;
    }
    if let Some(state) = status.shipment_state() {
        record.advance(state);
    }
    true
}
