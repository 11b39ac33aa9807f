use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dispatch_core::{DispatchError, DispatchResult};
use dispatch_shared::{OrderRef, ScanEvent};
use dispatch_shipment::models::{ShipmentRecord, ShipmentState, ShipmentType, ShippingMode};
use dispatch_shipment::repository::ShipmentRepository;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Serde round-trip helpers so the enum wire names (SCREAMING_SNAKE)
/// are the single source of truth for column values.
pub(crate) fn enum_to_string<T: Serialize>(v: &T) -> String {
    serde_json::to_value(v)
        .ok()
        .and_then(|x| x.as_str().map(String::from))
        .unwrap_or_default()
}

pub(crate) fn enum_from_string<T: DeserializeOwned>(s: &str) -> DispatchResult<T> {
    serde_json::from_value(Value::String(s.to_string()))
        .map_err(|_| DispatchError::Internal(format!("unrecognized stored enum value {:?}", s)))
}

pub(crate) fn internal(e: sqlx::Error) -> DispatchError {
    DispatchError::Internal(format!("database error: {}", e))
}

pub struct PgShipmentRepository {
    pool: PgPool,
}

impl PgShipmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShipmentRow {
    id: Uuid,
    order_id: String,
    waybill_numbers: Vec<String>,
    pickup_location: String,
    shipping_mode: String,
    shipment_type: String,
    state: String,
    carrier_response: Option<Value>,
    failure_remark: Option<String>,
    scans: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShipmentRow {
    fn into_record(self) -> DispatchResult<ShipmentRecord> {
        let scans: Vec<ScanEvent> = serde_json::from_value(self.scans)
            .map_err(|e| DispatchError::Internal(format!("stored scans corrupt: {}", e)))?;
        Ok(ShipmentRecord {
            id: self.id,
            order_id: OrderRef::new(self.order_id),
            waybill_numbers: self.waybill_numbers,
            pickup_location: self.pickup_location,
            shipping_mode: enum_from_string::<ShippingMode>(&self.shipping_mode)?,
            shipment_type: enum_from_string::<ShipmentType>(&self.shipment_type)?,
            state: enum_from_string::<ShipmentState>(&self.state)?,
            carrier_response: self.carrier_response,
            failure_remark: self.failure_remark,
            scans,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, order_id, waybill_numbers, pickup_location, \
     shipping_mode, shipment_type, state, carrier_response, failure_remark, scans, \
     created_at, updated_at FROM shipments";

#[async_trait]
impl ShipmentRepository for PgShipmentRepository {
    async fn begin_shipment(&self, record: ShipmentRecord) -> DispatchResult<()> {
        let scans = serde_json::to_value(&record.scans)
            .map_err(|e| DispatchError::Internal(e.to_string()))?;

        // The partial unique index on (order_id) WHERE state is live
        // makes this insert the atomic idempotency check.
        sqlx::query(
            "INSERT INTO shipments (id, order_id, waybill_numbers, pickup_location, \
             shipping_mode, shipment_type, state, carrier_response, failure_remark, scans, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(record.id)
        .bind(record.order_id.as_str())
        .bind(&record.waybill_numbers)
        .bind(&record.pickup_location)
        .bind(enum_to_string(&record.shipping_mode))
        .bind(enum_to_string(&record.shipment_type))
        .bind(enum_to_string(&record.state))
        .bind(&record.carrier_response)
        .bind(&record.failure_remark)
        .bind(scans)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DispatchError::AlreadyExists(format!(
                    "order {} already has a live shipment",
                    record.order_id
                ))
            }
            _ => internal(e),
        })?;
        Ok(())
    }

    async fn update(&self, record: &ShipmentRecord) -> DispatchResult<()> {
        let scans = serde_json::to_value(&record.scans)
            .map_err(|e| DispatchError::Internal(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE shipments SET waybill_numbers = $2, state = $3, carrier_response = $4, \
             failure_remark = $5, scans = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(record.id)
        .bind(&record.waybill_numbers)
        .bind(enum_to_string(&record.state))
        .bind(&record.carrier_response)
        .bind(&record.failure_remark)
        .bind(scans)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(DispatchError::NotFound(format!("shipment {}", record.id)));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DispatchResult<Option<ShipmentRecord>> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(ShipmentRow::into_record).transpose()
    }

    async fn get_by_order(&self, order: &OrderRef) -> DispatchResult<Option<ShipmentRecord>> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "{} WHERE order_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(order.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;
        row.map(ShipmentRow::into_record).transpose()
    }

    async fn get_by_waybill(&self, waybill: &str) -> DispatchResult<Option<ShipmentRecord>> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "{} WHERE $1 = ANY(waybill_numbers) LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(waybill)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;
        row.map(ShipmentRow::into_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_matches_index_predicate() {
        // The live-order partial index filters on these exact strings.
        assert_eq!(enum_to_string(&ShipmentState::Failed), "FAILED");
        assert_eq!(enum_to_string(&ShipmentState::Cancelled), "CANCELLED");
        assert_eq!(enum_to_string(&ShipmentState::Created), "CREATED");

        let state: ShipmentState = enum_from_string("DISPATCHED").unwrap();
        assert_eq!(state, ShipmentState::Dispatched);
        assert!(enum_from_string::<ShipmentState>("BOGUS").is_err());
    }
}
