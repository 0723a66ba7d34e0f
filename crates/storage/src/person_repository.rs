//! Person reads and the counters write that only ever happens inside the
//! same transaction as the Assignment/CallAssignment write that caused it
//! (spec §5 "Shared resource policy").

use std::collections::HashSet;

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use residency_domain::{CallEquityCounters, FacultyRoleTag, Person, PersonRole, PersonStatus};

use crate::StorageError;

#[derive(Clone)]
pub struct PersonRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct PersonRow {
    id: Uuid,
    display_name: String,
    role_kind: String,
    pgy_level: Option<i16>,
    role_tag: Option<String>,
    specialties: Option<Vec<String>>,
    email: String,
    sunday_call_count: i32,
    weekday_call_count: i32,
    fmit_week_count: i32,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl PersonRow {
    fn into_domain(self) -> Person {
        let role = if self.role_kind == "resident" {
            PersonRole::Resident {
                pgy_level: self.pgy_level.unwrap_or_default() as u8,
            }
        } else {
            let role_tag = match self.role_tag.as_deref() {
                Some("program_director") => FacultyRoleTag::ProgramDirector,
                Some("associate_program_director") => FacultyRoleTag::AssociateProgramDirector,
                Some("core") => FacultyRoleTag::Core,
                Some("sports_med") => FacultyRoleTag::SportsMed,
                Some(other) => FacultyRoleTag::Other(other.to_string()),
                None => FacultyRoleTag::Core,
            };
            PersonRole::Faculty {
                role_tag,
                specialties: self.specialties.unwrap_or_default().into_iter().collect::<HashSet<_>>(),
            }
        };

        Person {
            id: self.id,
            display_name: self.display_name,
            role,
            email: self.email,
            counters: CallEquityCounters {
                sunday_call_count: self.sunday_call_count.max(0) as u32,
                weekday_call_count: self.weekday_call_count.max(0) as u32,
                fmit_week_count: self.fmit_week_count.max(0) as u32,
            },
            status: if self.status == "active" {
                PersonStatus::Active
            } else {
                PersonStatus::Tombstoned
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl PersonRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Person, StorageError> {
        let row = sqlx::query_as::<_, PersonRow>(
            r#"
            SELECT id, display_name, role_kind, pgy_level, role_tag, specialties, email,
                   sunday_call_count, weekday_call_count, fmit_week_count, status,
                   created_at, updated_at
            FROM people WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?
        .ok_or_else(|| StorageError::NotFound {
            entity: "Person".to_string(),
            id: id.to_string(),
        })?;

        Ok(row.into_domain())
    }

    pub async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Person>, StorageError> {
        let rows = sqlx::query_as::<_, PersonRow>(
            r#"
            SELECT id, display_name, role_kind, pgy_level, role_tag, specialties, email,
                   sunday_call_count, weekday_call_count, fmit_week_count, status,
                   created_at, updated_at
            FROM people WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(PersonRow::into_domain).collect())
    }

    /// Active roster, optionally filtered to the given PGY levels (spec §6
    /// generation request `pgy_levels?`).
    pub async fn list_active(&self, pgy_levels: Option<&[u8]>) -> Result<Vec<Person>, StorageError> {
        let levels: Option<Vec<i16>> = pgy_levels.map(|ls| ls.iter().map(|l| *l as i16).collect());
        let rows = sqlx::query_as::<_, PersonRow>(
            r#"
            SELECT id, display_name, role_kind, pgy_level, role_tag, specialties, email,
                   sunday_call_count, weekday_call_count, fmit_week_count, status,
                   created_at, updated_at
            FROM people
            WHERE status = 'active' AND ($1::smallint[] IS NULL OR pgy_level = ANY($1))
            ORDER BY display_name
            "#,
        )
        .bind(levels)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(PersonRow::into_domain).collect())
    }

    /// Recompute and persist `counters` for `person_id` from the
    /// Assignment/CallAssignment tables, inside the caller's transaction
    /// (spec §3 "Counters are ... derivable from assignments", §5).
    pub async fn recompute_counters_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        person_id: Uuid,
    ) -> Result<(), StorageError> {
        let row: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE EXTRACT(DOW FROM ca.date) = 0) AS sunday_call_count,
                COUNT(*) FILTER (WHERE EXTRACT(DOW FROM ca.date) != 0) AS weekday_call_count,
                (SELECT COUNT(DISTINCT date_trunc('week', a.b_date))
                 FROM (SELECT b.date AS b_date FROM assignments asg
                       JOIN blocks b ON b.id = asg.block_id
                       JOIN rotations r ON r.id = asg.rotation_id
                       WHERE asg.person_id = $1 AND r.category = 'night_float') a
                ) AS fmit_week_count
            FROM call_assignments ca
            WHERE ca.person_id = $1
            "#,
        )
        .bind(person_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        sqlx::query(
            r#"
            UPDATE people
            SET sunday_call_count = $2, weekday_call_count = $3, fmit_week_count = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(person_id)
        .bind(row.0 as i32)
        .bind(row.1 as i32)
        .bind(row.2 as i32)
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        tracing::debug!(
            person_id = %person_id,
            sunday_call_count = row.0,
            weekday_call_count = row.1,
            "recomputed call equity counters"
        );

        Ok(())
    }

    pub async fn certifications_for(&self, person_id: Uuid) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT certification FROM person_certifications WHERE person_id = $1")
                .bind(person_id)
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::Query)?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }

    pub async fn has_clearance(&self, person_id: Uuid) -> Result<bool, StorageError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT has_supervisory_clearance FROM people WHERE id = $1")
                .bind(person_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::Query)?;
        Ok(row.map(|(c,)| c).unwrap_or(false))
    }

    /// `context` for an Invariant error's `details` (spec §8 scenario 2).
    pub fn violation_context(before: f64, after: f64, limit: f64) -> serde_json::Value {
        json!({ "hours_before": before, "hours_after": after, "limit": limit })
    }
}
