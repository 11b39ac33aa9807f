use crate::inventory::WaybillInventory;
use crate::models::{Waybill, WaybillSource};
use dispatch_core::carrier::CarrierApi;
use dispatch_core::{DispatchError, DispatchResult};
use dispatch_shared::OrderRef;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Carrier-imposed generation limits, enforced client-side so we fail
/// fast instead of leaning on carrier 429s.
#[derive(Debug, Clone)]
pub struct AllocatorLimits {
    /// Max codes in one bulk request.
    pub max_per_request: u32,
    /// Aggregate bulk codes per rolling window.
    pub bulk_window_cap: u32,
    /// Single-waybill fetches per rolling window.
    pub single_window_cap: u32,
    pub window: Duration,
}

impl Default for AllocatorLimits {
    fn default() -> Self {
        Self {
            max_per_request: 10_000,
            bulk_window_cap: 50_000,
            single_window_cap: 750,
            window: Duration::from_secs(300),
        }
    }
}

/// The carrier generates bulk waybills in internal batches of this
/// size; nothing above it can be assumed atomic.
const CARRIER_BATCH: u32 = 25;

/// Bounded number of shortfall retries when the carrier returns
/// partial batches.
const MAX_SHORTFALL_ROUNDS: u32 = 8;

/// Rolling usage counter over a fixed window.
pub(crate) struct RateWindow {
    cap: u32,
    window: Duration,
    events: Mutex<VecDeque<(Instant, u32)>>,
}

impl RateWindow {
    fn new(cap: u32, window: Duration) -> Self {
        Self {
            cap,
            window,
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Reserve `n` units of quota, or report how much is left.
    fn try_consume(&self, n: u32) -> Result<(), u32> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cutoff) = Instant::now().checked_sub(self.window) {
            while events.front().is_some_and(|(t, _)| *t < cutoff) {
                events.pop_front();
            }
        }
        let used: u32 = events.iter().map(|(_, n)| *n).sum();
        let remaining = self.cap.saturating_sub(used);
        if n > remaining {
            return Err(remaining);
        }
        events.push_back((Instant::now(), n));
        Ok(())
    }
}

/// Decides how a waybill request is satisfied: stored inventory first,
/// then carrier bulk generation, then a local fallback generator for
/// when the carrier is unreachable or unconfigured.
pub struct WaybillAllocator {
    inventory: Arc<WaybillInventory>,
    carrier: Arc<dyn CarrierApi>,
    limits: AllocatorLimits,
    bulk_window: RateWindow,
    single_window: RateWindow,
}

impl WaybillAllocator {
    pub fn new(
        inventory: Arc<WaybillInventory>,
        carrier: Arc<dyn CarrierApi>,
        limits: AllocatorLimits,
    ) -> Self {
        let bulk_window = RateWindow::new(limits.bulk_window_cap, limits.window);
        let single_window = RateWindow::new(limits.single_window_cap, limits.window);
        Self {
            inventory,
            carrier,
            limits,
            bulk_window,
            single_window,
        }
    }

    pub fn inventory(&self) -> &Arc<WaybillInventory> {
        &self.inventory
    }

    /// Allocate `count` waybills, reserved for `reserved_for` when
    /// given. Returned waybills are Reserved in the inventory; callers
    /// commit or release them.
    ///
    /// Bound checks run before any network I/O: a request that cannot
    /// fit the rolling window fails RateLimited; a request outside
    /// [1, max_per_request] fails InvalidArgument.
    pub async fn allocate(
        &self,
        count: u32,
        prefer_stored: bool,
        reserved_for: Option<&OrderRef>,
    ) -> DispatchResult<Vec<Waybill>> {
        if count < 1 {
            return Err(DispatchError::InvalidArgument(
                "waybill count must be at least 1".into(),
            ));
        }
        if count > self.limits.bulk_window_cap {
            return Err(DispatchError::RateLimited(format!(
                "requested {} waybills exceeds the {}-per-{}s generation window",
                count,
                self.limits.bulk_window_cap,
                self.limits.window.as_secs()
            )));
        }
        if count > self.limits.max_per_request {
            return Err(DispatchError::InvalidArgument(format!(
                "waybill count must be between 1 and {}",
                self.limits.max_per_request
            )));
        }

        let mut allocated = Vec::new();
        if prefer_stored {
            allocated = self.inventory.claim(count as usize, reserved_for);
            if allocated.len() == count as usize {
                return Ok(allocated);
            }
        }

        let shortfall = count - allocated.len() as u32;
        match self.generate_from_carrier(shortfall, reserved_for).await {
            Ok(mut generated) => allocated.append(&mut generated),
            Err(e @ (DispatchError::Configuration(_) | DispatchError::Transient(_))) => {
                tracing::warn!(error = %e, "carrier unavailable, using local fallback waybills");
                let remaining = count - allocated.len() as u32;
                allocated.append(&mut self.generate_local(remaining, reserved_for));
            }
            Err(e) => {
                // Terminal carrier answer: give back what we claimed so
                // the pool is not drained by a failed allocation.
                let codes: Vec<String> = allocated.iter().map(|w| w.code.clone()).collect();
                let _ = self.inventory.release(&codes);
                return Err(e);
            }
        }

        Ok(allocated)
    }

    /// Fetch a single carrier waybill, subject to the single-fetch
    /// window.
    pub async fn fetch_single(&self, reserved_for: Option<&OrderRef>) -> DispatchResult<Waybill> {
        if let Err(remaining) = self.single_window.try_consume(1) {
            return Err(DispatchError::RateLimited(format!(
                "single-waybill window exhausted ({} remaining)",
                remaining
            )));
        }
        let code = self.carrier.fetch_waybill().await?;
        let mut reserved =
            self.inventory
                .store_reserved(&[code.clone()], WaybillSource::Carrier, reserved_for);
        reserved
            .pop()
            .ok_or_else(|| DispatchError::Internal(format!("duplicate carrier waybill {}", code)))
    }

    /// Bulk-generate `needed` codes from the carrier. Partial batches
    /// are accepted; only the shortfall is retried, a bounded number of
    /// times.
    async fn generate_from_carrier(
        &self,
        needed: u32,
        reserved_for: Option<&OrderRef>,
    ) -> DispatchResult<Vec<Waybill>> {
        if let Err(remaining) = self.bulk_window.try_consume(needed) {
            return Err(DispatchError::RateLimited(format!(
                "bulk generation window exhausted ({} of {} remaining)",
                remaining, self.limits.bulk_window_cap
            )));
        }

        let mut out: Vec<Waybill> = Vec::with_capacity(needed as usize);
        let mut rounds = 0;
        while (out.len() as u32) < needed && rounds < MAX_SHORTFALL_ROUNDS {
            let remaining = needed - out.len() as u32;
            let codes = self.carrier.generate_waybills(remaining).await?;
            if codes.is_empty() {
                break;
            }
            let take = (remaining as usize).min(codes.len());
            let (head, surplus) = codes.split_at(take);
            let mut reserved =
                self.inventory
                    .store_reserved(head, WaybillSource::Carrier, reserved_for);
            out.append(&mut reserved);
            if !surplus.is_empty() {
                // Surplus from a carrier batch goes into the pool as
                // Available instead of dangling Reserved.
                self.inventory.store(surplus, WaybillSource::Carrier);
            }
            rounds += 1;
        }

        if (out.len() as u32) < needed {
            tracing::warn!(
                requested = needed,
                received = out.len(),
                "carrier bulk generation came up short"
            );
        }
        Ok(out)
    }

    /// Produce syntactically valid but carrier-unregistered codes,
    /// flagged LocalFallback so callers can refuse them for real
    /// shipments.
    fn generate_local(&self, needed: u32, reserved_for: Option<&OrderRef>) -> Vec<Waybill> {
        let mut out = Vec::with_capacity(needed as usize);
        let mut rng = rand::thread_rng();
        while (out.len() as u32) < needed {
            let code = format!("{:014}", rng.gen_range(10_000_000_000_000u64..=99_999_999_999_999));
            let mut reserved =
                self.inventory
                    .store_reserved(&[code], WaybillSource::LocalFallback, reserved_for);
            out.append(&mut reserved);
        }
        out
    }
}
