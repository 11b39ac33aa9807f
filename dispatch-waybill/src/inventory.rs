use crate::models::{Waybill, WaybillSource, WaybillStatus};
use dispatch_shared::OrderRef;
use std::collections::HashMap;
use std::sync::Mutex;

/// Counts per pool state, for diagnostics and the operator surface.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct InventoryCounts {
    pub available: usize,
    pub reserved: usize,
    pub used: usize,
}

/// Shared pool of pre-generated waybills.
///
/// All mutation happens under one mutex so `claim` is atomic: two
/// concurrent claims never hand out the same code, and a claim returns
/// fewer than asked when the pool is short rather than blocking.
pub struct WaybillInventory {
    pool: Mutex<HashMap<String, Waybill>>,
}

impl WaybillInventory {
    pub fn new() -> Self {
        Self {
            pool: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Waybill>> {
        // A poisoned lock only means another claimer panicked mid-call;
        // the map itself is still structurally sound.
        self.pool.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ingest codes as Available. Codes already present in any state are
    /// skipped, so a Used code can never be resurrected. Returns how
    /// many were actually stored.
    pub fn store(&self, codes: &[String], source: WaybillSource) -> usize {
        let mut pool = self.lock();
        let mut stored = 0;
        for code in codes {
            if code.is_empty() || pool.contains_key(code) {
                continue;
            }
            pool.insert(code.clone(), Waybill::new(code.clone(), source));
            stored += 1;
        }
        stored
    }

    /// Ingest freshly generated codes directly as Reserved, handing them
    /// to the caller that triggered generation. Duplicates are skipped.
    pub fn store_reserved(
        &self,
        codes: &[String],
        source: WaybillSource,
        reserved_for: Option<&OrderRef>,
    ) -> Vec<Waybill> {
        let mut pool = self.lock();
        let mut out = Vec::new();
        for code in codes {
            if code.is_empty() || pool.contains_key(code) {
                continue;
            }
            let mut wb = Waybill::new(code.clone(), source);
            wb.status = WaybillStatus::Reserved;
            wb.reserved_for = reserved_for.cloned();
            pool.insert(code.clone(), wb.clone());
            out.push(wb);
        }
        out
    }

    /// Atomically move up to `n` Available waybills to Reserved.
    pub fn claim(&self, n: usize, reserved_for: Option<&OrderRef>) -> Vec<Waybill> {
        let mut pool = self.lock();
        let codes: Vec<String> = pool
            .values()
            .filter(|w| w.status == WaybillStatus::Available)
            .take(n)
            .map(|w| w.code.clone())
            .collect();

        let mut claimed = Vec::with_capacity(codes.len());
        for code in codes {
            if let Some(wb) = pool.get_mut(&code) {
                wb.status = WaybillStatus::Reserved;
                wb.reserved_for = reserved_for.cloned();
                claimed.push(wb.clone());
            }
        }
        claimed
    }

    /// Mark Reserved codes as Used. Idempotent for codes already Used.
    pub fn commit(&self, codes: &[String]) -> Result<(), InventoryError> {
        let mut pool = self.lock();
        for code in codes {
            match pool.get_mut(code) {
                None => return Err(InventoryError::NotFound(code.clone())),
                Some(wb) => match wb.status {
                    WaybillStatus::Reserved => wb.status = WaybillStatus::Used,
                    WaybillStatus::Used => {}
                    WaybillStatus::Available => {
                        return Err(InventoryError::NotReserved(code.clone()));
                    }
                },
            }
        }
        Ok(())
    }

    /// Return Reserved codes to Available so a failed shipment attempt
    /// does not waste them. No-op for codes already Available; a Used
    /// code cannot come back.
    pub fn release(&self, codes: &[String]) -> Result<(), InventoryError> {
        let mut pool = self.lock();
        for code in codes {
            match pool.get_mut(code) {
                None => return Err(InventoryError::NotFound(code.clone())),
                Some(wb) => match wb.status {
                    WaybillStatus::Reserved => {
                        wb.status = WaybillStatus::Available;
                        wb.reserved_for = None;
                    }
                    WaybillStatus::Available => {}
                    WaybillStatus::Used => {
                        return Err(InventoryError::AlreadyUsed(code.clone()));
                    }
                },
            }
        }
        Ok(())
    }

    pub fn status(&self, code: &str) -> Option<WaybillStatus> {
        self.lock().get(code).map(|w| w.status)
    }

    pub fn get(&self, code: &str) -> Option<Waybill> {
        self.lock().get(code).cloned()
    }

    pub fn counts(&self) -> InventoryCounts {
        let pool = self.lock();
        let mut counts = InventoryCounts::default();
        for wb in pool.values() {
            match wb.status {
                WaybillStatus::Available => counts.available += 1,
                WaybillStatus::Reserved => counts.reserved += 1,
                WaybillStatus::Used => counts.used += 1,
            }
        }
        counts
    }
}

impl Default for WaybillInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Waybill not found in pool: {0}")]
    NotFound(String),

    #[error("Waybill is not reserved: {0}")]
    NotReserved(String),

    #[error("Waybill already used, cannot release: {0}")]
    AlreadyUsed(String),
}

impl From<InventoryError> for dispatch_core::DispatchError {
    fn from(e: InventoryError) -> Self {
        dispatch_core::DispatchError::Internal(e.to_string())
    }
}
