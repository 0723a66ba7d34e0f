//! Append-only audit event log (spec §4.D "Audit", §1.2 read model).

use sqlx::PgPool;
use uuid::Uuid;

use residency_domain::{AuditEvent, AuditEventKind};

use crate::StorageError;

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    correlation_id: Uuid,
    kind: serde_json::Value,
    actor_id: Option<Uuid>,
    recorded_at: chrono::DateTime<chrono::Utc>,
    transaction_id: i64,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one event. Never updates or deletes existing rows (spec
    /// §4.D "logs are append-only").
    pub async fn append(&self, event: &AuditEvent) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (id, correlation_id, kind, actor_id, recorded_at, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.correlation_id)
        .bind(serde_json::to_value(&event.kind).unwrap_or_default())
        .bind(event.actor_id)
        .bind(event.recorded_at)
        .bind(event.transaction_id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(())
    }

    /// Same write, inside the caller's commit transaction, so the audit
    /// trail's `transaction_id` matches the mutation that produced it.
    pub async fn append_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        event: &AuditEvent,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (id, correlation_id, kind, actor_id, recorded_at, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.correlation_id)
        .bind(serde_json::to_value(&event.kind).unwrap_or_default())
        .bind(event.actor_id)
        .bind(event.recorded_at)
        .bind(event.transaction_id)
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        Ok(())
    }

    /// Read-only query over one correlation id's history, totally ordered
    /// by the store-assigned transaction id (spec §1.2, §5 "Ordering
    /// guarantees").
    pub async fn list_for_correlation(&self, correlation_id: Uuid) -> Result<Vec<AuditEvent>, StorageError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, correlation_id, kind, actor_id, recorded_at, transaction_id
            FROM audit_events WHERE correlation_id = $1
            ORDER BY transaction_id
            "#,
        )
        .bind(correlation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        rows.into_iter()
            .map(|row| {
                let kind: AuditEventKind = serde_json::from_value(row.kind)
                    .map_err(|e| StorageError::Query(sqlx::Error::Decode(Box::new(e))))?;
                Ok(AuditEvent {
                    id: row.id,
                    correlation_id: row.correlation_id,
                    kind,
                    actor_id: row.actor_id,
                    recorded_at: row.recorded_at,
                    transaction_id: row.transaction_id,
                })
            })
            .collect()
    }
}
