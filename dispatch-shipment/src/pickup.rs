use crate::models::{PickupRequest, PickupStatus};
use crate::repository::PickupRepository;
use chrono::{NaiveDate, NaiveTime, Utc};
use dispatch_core::carrier::{CarrierApi, PickupPayload};
use dispatch_core::warehouse::WarehouseRegistry;
use dispatch_core::{DispatchError, DispatchResult};
use std::sync::Arc;
use uuid::Uuid;

const MAX_WAYBILLS_PER_PICKUP: usize = 1000;

/// Recognize the carrier's wallet-balance refusal. This one failure is
/// a billing problem, not an operational one, so scheduling degrades to
/// a locally-tracked record instead of failing.
fn is_wallet_balance_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("insufficient") && lower.contains("balance")
}

/// Reclassify a carrier pickup failure: a wallet-balance refusal
/// becomes `CarrierDegraded`, everything else passes through unchanged.
fn classify_pickup_failure(e: DispatchError) -> DispatchError {
    match e {
        degraded @ DispatchError::CarrierDegraded(_) => degraded,
        other if is_wallet_balance_error(&other.to_string()) => {
            DispatchError::CarrierDegraded(other.to_string())
        }
        other => other,
    }
}

/// Creates and cancels pickup requests bound to sets of waybills.
pub struct PickupScheduler {
    pickups: Arc<dyn PickupRepository>,
    warehouses: Arc<dyn WarehouseRegistry>,
    carrier: Arc<dyn CarrierApi>,
}

impl PickupScheduler {
    pub fn new(
        pickups: Arc<dyn PickupRepository>,
        warehouses: Arc<dyn WarehouseRegistry>,
        carrier: Arc<dyn CarrierApi>,
    ) -> Self {
        Self {
            pickups,
            warehouses,
            carrier,
        }
    }

    pub async fn schedule(
        &self,
        waybills: Vec<String>,
        date: &str,
        time: &str,
        pickup_location: &str,
    ) -> DispatchResult<PickupRequest> {
        if waybills.is_empty() || waybills.len() > MAX_WAYBILLS_PER_PICKUP {
            return Err(DispatchError::InvalidArgument(format!(
                "pickup must cover between 1 and {} waybills",
                MAX_WAYBILLS_PER_PICKUP
            )));
        }
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(DispatchError::InvalidArgument(format!(
                "pickup date must be YYYY-MM-DD, got {:?}",
                date
            )));
        }
        if NaiveTime::parse_from_str(time, "%H:%M").is_err() {
            return Err(DispatchError::InvalidArgument(format!(
                "pickup time must be HH:MM, got {:?}",
                time
            )));
        }

        // A waybill belongs to at most one non-cancelled pickup.
        for waybill in &waybills {
            if let Some(existing) = self.pickups.active_for_waybill(waybill).await? {
                return Err(DispatchError::AlreadyExists(format!(
                    "waybill {} is already on pickup {}",
                    waybill, existing.pickup_id
                )));
            }
        }

        let warehouse = self
            .warehouses
            .resolve(pickup_location)
            .await?
            .ok_or_else(|| {
                DispatchError::InvalidArgument(format!(
                    "unknown pickup location {}",
                    pickup_location
                ))
            })?;

        let payload = PickupPayload {
            pickup_location: warehouse.name.clone(),
            pickup_date: date.to_string(),
            pickup_time: time.to_string(),
            expected_package_count: waybills.len() as u32,
        };

        let now = Utc::now();
        let mut request = PickupRequest {
            pickup_id: String::new(),
            waybill_numbers: waybills,
            pickup_location: warehouse.name.clone(),
            scheduled_date: date.to_string(),
            scheduled_time: time.to_string(),
            status: PickupStatus::Scheduled,
            carrier_response: None,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        match self.carrier.create_pickup(&payload).await {
            Ok(response) => {
                request.pickup_id = response
                    .pickup_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                request.carrier_response = serde_json::to_value(&response).ok();
                self.pickups.create(request.clone()).await?;
                tracing::info!(pickup = %request.pickup_id, "pickup scheduled with carrier");
                Ok(request)
            }
            Err(e) => match classify_pickup_failure(e) {
                DispatchError::CarrierDegraded(cause) => {
                    // Degrade, don't abort: billing blocked the carrier
                    // call, so keep a local record the UI can distinguish.
                    request.pickup_id = format!("TEST-{}", Uuid::new_v4().simple());
                    request.status = PickupStatus::ScheduledTest;
                    request.note(format!("recorded locally only; {}", cause));
                    self.pickups.create(request.clone()).await?;
                    tracing::warn!(pickup = %request.pickup_id, "pickup degraded to test record");
                    Ok(request)
                }
                other => Err(other),
            },
        }
    }

    /// Soft cancellation: the record is kept with an audit note.
    /// Cancelling an already-cancelled pickup is a no-op.
    pub async fn cancel(&self, pickup_id: &str) -> DispatchResult<PickupRequest> {
        let mut request = self
            .pickups
            .get(pickup_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("pickup {}", pickup_id)))?;

        match request.status {
            PickupStatus::Cancelled => Ok(request),
            PickupStatus::Completed => Err(DispatchError::InvalidArgument(format!(
                "pickup {} is already completed",
                pickup_id
            ))),
            _ => {
                request.status = PickupStatus::Cancelled;
                request.note(format!("cancelled by operator at {}", Utc::now().to_rfc3339()));
                self.pickups.update(&request).await?;
                Ok(request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_balance_detection() {
        assert!(is_wallet_balance_error(
            "Carrier validation failure: Insufficient balance in wallet"
        ));
        assert!(is_wallet_balance_error("insufficient wallet BALANCE"));
        assert!(!is_wallet_balance_error("Pin code not serviceable"));
    }

    #[test]
    fn test_wallet_failure_reclassified_as_degraded() {
        let degraded = classify_pickup_failure(DispatchError::ValidationError(
            "Insufficient balance in wallet, please recharge".into(),
        ));
        assert!(matches!(degraded, DispatchError::CarrierDegraded(_)));

        let untouched = classify_pickup_failure(DispatchError::ValidationError(
            "Pickup slot not available".into(),
        ));
        assert!(matches!(untouched, DispatchError::ValidationError(_)));
    }
}
