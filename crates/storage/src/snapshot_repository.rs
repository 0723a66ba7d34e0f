//! Snapshot persistence: pre-mutation state capture and its restore path
//! (spec §4.A `snapshot`/`restore`, §4.D "Snapshot"/"Rollback window").

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use residency_domain::{Snapshot, SnapshotEntry};

use crate::person_repository::PersonRepository;
use crate::StorageError;

#[derive(Clone)]
pub struct SnapshotRepository {
    pool: PgPool,
}

impl SnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persists a snapshot built from the affected entities' pre-mutation
    /// `(entity_id, prior_person_id)` pairs, captured by the caller via
    /// `AssignmentRepository::current_assignment_owners` /
    /// `current_call_assignment_owners` before the mutating transaction.
    pub async fn take(
        &self,
        swap_id: Uuid,
        assignment_entries: Vec<SnapshotEntry>,
        call_assignment_entries: Vec<SnapshotEntry>,
    ) -> Result<Snapshot, StorageError> {
        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            swap_id,
            assignment_entries,
            call_assignment_entries,
            taken_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO swap_snapshots (id, swap_id, assignment_entries, call_assignment_entries, taken_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.swap_id)
        .bind(serde_json::to_value(&snapshot.assignment_entries).unwrap_or_default())
        .bind(serde_json::to_value(&snapshot.call_assignment_entries).unwrap_or_default())
        .bind(snapshot.taken_at)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(snapshot)
    }

    pub async fn get_by_swap_id(&self, swap_id: Uuid) -> Result<Snapshot, StorageError> {
        let row: (Uuid, Uuid, serde_json::Value, serde_json::Value, chrono::DateTime<Utc>) = sqlx::query_as(
            "SELECT id, swap_id, assignment_entries, call_assignment_entries, taken_at
             FROM swap_snapshots WHERE swap_id = $1",
        )
        .bind(swap_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?
        .ok_or_else(|| StorageError::NotFound {
            entity: "Snapshot".to_string(),
            id: swap_id.to_string(),
        })?;

        Ok(Snapshot {
            id: row.0,
            swap_id: row.1,
            assignment_entries: serde_json::from_value(row.2).unwrap_or_default(),
            call_assignment_entries: serde_json::from_value(row.3).unwrap_or_default(),
            taken_at: row.4,
        })
    }

    /// Restores every entry's `prior_person_id` onto its assignment/call
    /// assignment row inside one transaction, recomputing the affected
    /// persons' counters, and returns the store-assigned transaction id
    /// (spec §8 "`execute(swap) then rollback(swap)` restores byte-for-byte").
    pub async fn restore(&self, snapshot: &Snapshot, person_repo: &PersonRepository) -> Result<i64, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Query)?;

        let transaction_id: (i64,) = sqlx::query_as("INSERT INTO transaction_log DEFAULT VALUES RETURNING id")
            .fetch_one(&mut *tx)
            .await
            .map_err(StorageError::Query)?;

        let mut affected = Vec::new();
        for entry in &snapshot.assignment_entries {
            sqlx::query("UPDATE assignments SET person_id = $2, updated_at = now() WHERE id = $1")
                .bind(entry.entity_id)
                .bind(entry.prior_person_id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Query)?;
            affected.push(entry.prior_person_id);
        }

        for entry in &snapshot.call_assignment_entries {
            sqlx::query("UPDATE call_assignments SET person_id = $2 WHERE id = $1")
                .bind(entry.entity_id)
                .bind(entry.prior_person_id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Query)?;
            affected.push(entry.prior_person_id);
        }

        affected.sort();
        affected.dedup();
        for person_id in affected {
            person_repo.recompute_counters_tx(&mut tx, person_id).await?;
        }

        tx.commit().await.map_err(StorageError::Query)?;

        tracing::info!(swap_id = %snapshot.swap_id, transaction_id = transaction_id.0, "restored snapshot");

        Ok(transaction_id.0)
    }
}
