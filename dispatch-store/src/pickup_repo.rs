use crate::shipment_repo::{enum_from_string, enum_to_string, internal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dispatch_core::{DispatchError, DispatchResult};
use dispatch_shipment::models::{PickupRequest, PickupStatus};
use dispatch_shipment::repository::PickupRepository;
use serde_json::Value;
use sqlx::PgPool;

pub struct PgPickupRepository {
    pool: PgPool,
}

impl PgPickupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PickupRow {
    pickup_id: String,
    waybill_numbers: Vec<String>,
    pickup_location: String,
    scheduled_date: String,
    scheduled_time: String,
    status: String,
    carrier_response: Option<Value>,
    notes: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PickupRow {
    fn into_request(self) -> DispatchResult<PickupRequest> {
        Ok(PickupRequest {
            pickup_id: self.pickup_id,
            waybill_numbers: self.waybill_numbers,
            pickup_location: self.pickup_location,
            scheduled_date: self.scheduled_date,
            scheduled_time: self.scheduled_time,
            status: enum_from_string::<PickupStatus>(&self.status)?,
            carrier_response: self.carrier_response,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT pickup_id, waybill_numbers, pickup_location, \
     scheduled_date, scheduled_time, status, carrier_response, notes, created_at, updated_at \
     FROM pickups";

#[async_trait]
impl PickupRepository for PgPickupRepository {
    async fn create(&self, request: PickupRequest) -> DispatchResult<()> {
        sqlx::query(
            "INSERT INTO pickups (pickup_id, waybill_numbers, pickup_location, scheduled_date, \
             scheduled_time, status, carrier_response, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&request.pickup_id)
        .bind(&request.waybill_numbers)
        .bind(&request.pickup_location)
        .bind(&request.scheduled_date)
        .bind(&request.scheduled_time)
        .bind(enum_to_string(&request.status))
        .bind(&request.carrier_response)
        .bind(&request.notes)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DispatchError::AlreadyExists(format!("pickup {}", request.pickup_id))
            }
            _ => internal(e),
        })?;
        Ok(())
    }

    async fn get(&self, pickup_id: &str) -> DispatchResult<Option<PickupRequest>> {
        let row =
            sqlx::query_as::<_, PickupRow>(&format!("{} WHERE pickup_id = $1", SELECT_COLUMNS))
                .bind(pickup_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
        row.map(PickupRow::into_request).transpose()
    }

    async fn update(&self, request: &PickupRequest) -> DispatchResult<()> {
        let result = sqlx::query(
            "UPDATE pickups SET status = $2, carrier_response = $3, notes = $4, updated_at = $5 \
             WHERE pickup_id = $1",
        )
        .bind(&request.pickup_id)
        .bind(enum_to_string(&request.status))
        .bind(&request.carrier_response)
        .bind(&request.notes)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(DispatchError::NotFound(format!(
                "pickup {}",
                request.pickup_id
            )));
        }
        Ok(())
    }

    async fn active_for_waybill(&self, waybill: &str) -> DispatchResult<Option<PickupRequest>> {
        let row = sqlx::query_as::<_, PickupRow>(&format!(
            "{} WHERE $1 = ANY(waybill_numbers) AND status <> 'CANCELLED' LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(waybill)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;
        row.map(PickupRow::into_request).transpose()
    }
}
