//! SwapRecord persistence: the audit trail for swap requests and their
//! lifecycle (spec §3, §4.D).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use residency_domain::{SwapRecord, SwapStatus, SwapType};

use crate::StorageError;

#[derive(Clone)]
pub struct SwapRepository {
    pool: PgPool,
}

fn swap_type_str(swap_type: SwapType) -> &'static str {
    match swap_type {
        SwapType::OneToOne => "one_to_one",
        SwapType::Absorb => "absorb",
    }
}

fn parse_swap_type(raw: &str) -> SwapType {
    if raw == "absorb" { SwapType::Absorb } else { SwapType::OneToOne }
}

fn status_str(status: SwapStatus) -> &'static str {
    match status {
        SwapStatus::Pending => "pending",
        SwapStatus::Approved => "approved",
        SwapStatus::Rejected => "rejected",
        SwapStatus::Executed => "executed",
        SwapStatus::RolledBack => "rolled_back",
        SwapStatus::Cancelled => "cancelled",
    }
}

fn parse_status(raw: &str) -> SwapStatus {
    match raw {
        "approved" => SwapStatus::Approved,
        "rejected" => SwapStatus::Rejected,
        "executed" => SwapStatus::Executed,
        "rolled_back" => SwapStatus::RolledBack,
        "cancelled" => SwapStatus::Cancelled,
        _ => SwapStatus::Pending,
    }
}

#[derive(sqlx::FromRow)]
struct SwapRow {
    id: Uuid,
    swap_type: String,
    source_person_id: Uuid,
    source_week_start: chrono::NaiveDate,
    target_person_id: Option<Uuid>,
    target_week_start: Option<chrono::NaiveDate>,
    status: String,
    reason: String,
    requested_at: DateTime<Utc>,
    requested_by: Uuid,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<Uuid>,
    executed_at: Option<DateTime<Utc>>,
    executed_by: Option<Uuid>,
    rolled_back_at: Option<DateTime<Utc>>,
    rolled_back_by: Option<Uuid>,
    rollback_reason: Option<String>,
    transaction_id: Option<i64>,
}

impl SwapRow {
    fn into_domain(self) -> SwapRecord {
        SwapRecord {
            id: self.id,
            swap_type: parse_swap_type(&self.swap_type),
            source_person_id: self.source_person_id,
            source_week_start: self.source_week_start,
            target_person_id: self.target_person_id,
            target_week_start: self.target_week_start,
            status: parse_status(&self.status),
            reason: self.reason,
            requested_at: self.requested_at,
            requested_by: self.requested_by,
            approved_at: self.approved_at,
            approved_by: self.approved_by,
            executed_at: self.executed_at,
            executed_by: self.executed_by,
            rolled_back_at: self.rolled_back_at,
            rolled_back_by: self.rolled_back_by,
            rollback_reason: self.rollback_reason,
            transaction_id: self.transaction_id,
        }
    }
}

impl SwapRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: &SwapRecord) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO swap_records
                (id, swap_type, source_person_id, source_week_start, target_person_id,
                 target_week_start, status, reason, requested_at, requested_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(swap_type_str(record.swap_type))
        .bind(record.source_person_id)
        .bind(record.source_week_start)
        .bind(record.target_person_id)
        .bind(record.target_week_start)
        .bind(status_str(record.status))
        .bind(&record.reason)
        .bind(record.requested_at)
        .bind(record.requested_by)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<SwapRecord, StorageError> {
        let row = sqlx::query_as::<_, SwapRow>(
            r#"
            SELECT id, swap_type, source_person_id, source_week_start, target_person_id,
                   target_week_start, status, reason, requested_at, requested_by,
                   approved_at, approved_by, executed_at, executed_by,
                   rolled_back_at, rolled_back_by, rollback_reason, transaction_id
            FROM swap_records WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?
        .ok_or_else(|| StorageError::NotFound {
            entity: "SwapRecord".to_string(),
            id: id.to_string(),
        })?;

        Ok(row.into_domain())
    }

    pub async fn set_status(&self, id: Uuid, status: SwapStatus) -> Result<(), StorageError> {
        sqlx::query("UPDATE swap_records SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status_str(status))
            .execute(&self.pool)
            .await
            .map_err(StorageError::Query)?;
        Ok(())
    }

    pub async fn mark_approved(&self, id: Uuid, approved_at: DateTime<Utc>, approved_by: Uuid) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE swap_records SET status = 'approved', approved_at = $2, approved_by = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(approved_at)
        .bind(approved_by)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(())
    }

    /// Inside the same transaction as the mutating commit (spec §4.D
    /// "Commit"); takes the assignment-mutation transaction so the
    /// SwapRecord write is part of the same atomic unit.
    pub async fn mark_executed_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        executed_at: DateTime<Utc>,
        executed_by: Uuid,
        transaction_id: i64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            UPDATE swap_records
            SET status = 'executed', executed_at = $2, executed_by = $3, transaction_id = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(executed_at)
        .bind(executed_by)
        .bind(transaction_id)
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;
        Ok(())
    }

    pub async fn mark_rolled_back(
        &self,
        id: Uuid,
        rolled_back_at: DateTime<Utc>,
        rolled_back_by: Uuid,
        reason: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            UPDATE swap_records
            SET status = 'rolled_back', rolled_back_at = $2, rolled_back_by = $3, rollback_reason = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(rolled_back_at)
        .bind(rolled_back_by)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(())
    }

    /// Executed swaps whose rollback window has not yet elapsed as of
    /// `now`, used by the auto-detection sweep and the rollback-monitor
    /// actor (spec §4.D "Auto-detection post-commit").
    pub async fn list_executed_since(&self, since: DateTime<Utc>) -> Result<Vec<SwapRecord>, StorageError> {
        let rows = sqlx::query_as::<_, SwapRow>(
            r#"
            SELECT id, swap_type, source_person_id, source_week_start, target_person_id,
                   target_week_start, status, reason, requested_at, requested_by,
                   approved_at, approved_by, executed_at, executed_by,
                   rolled_back_at, rolled_back_by, rollback_reason, transaction_id
            FROM swap_records WHERE status = 'executed' AND executed_at >= $1
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(SwapRow::into_domain).collect())
    }
}
