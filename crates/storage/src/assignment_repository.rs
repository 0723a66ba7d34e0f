//! Assignment / CallAssignment reads and the single-transaction mutation
//! API the generator and swap engine both build on (spec §4.A
//! `apply_assignments`, §5 "Person counters are written only inside the
//! same transaction as the Assignment write that caused them to change").

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use residency_domain::{Assignment, CallAssignment, CallType, RotationCategory};

use crate::person_repository::PersonRepository;
use crate::rotation_repository::parse_category;
use crate::StorageError;

#[derive(Clone)]
pub struct AssignmentRepository {
    pool: PgPool,
}

/// One mutation against assignments or call assignments, applied atomically
/// as part of `apply_assignments` (spec §4.A).
#[derive(Debug, Clone)]
pub enum AssignmentMutation {
    UpsertAssignment {
        id: Uuid,
        block_id: Uuid,
        person_id: Uuid,
        rotation_id: Uuid,
        notes: Option<String>,
    },
    DeleteAssignment {
        id: Uuid,
    },
    UpsertCallAssignment {
        id: Uuid,
        date: NaiveDate,
        call_type: CallType,
        person_id: Uuid,
        is_weekend: bool,
        is_holiday: bool,
    },
    DeleteCallAssignment {
        date: NaiveDate,
        call_type: CallType,
    },
}

fn call_type_str(call_type: CallType) -> &'static str {
    match call_type {
        CallType::Overnight => "overnight",
        CallType::Weekend => "weekend",
        CallType::Backup => "backup",
    }
}

fn parse_call_type(raw: &str) -> CallType {
    match raw {
        "overnight" => CallType::Overnight,
        "weekend" => CallType::Weekend,
        _ => CallType::Backup,
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: Uuid,
    block_id: Uuid,
    person_id: Uuid,
    rotation_id: Uuid,
    notes: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl AssignmentRow {
    fn into_domain(self) -> Assignment {
        Assignment {
            id: self.id,
            block_id: self.block_id,
            person_id: self.person_id,
            rotation_id: self.rotation_id,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CallAssignmentRow {
    id: Uuid,
    date: NaiveDate,
    person_id: Uuid,
    call_type: String,
    is_weekend: bool,
    is_holiday: bool,
}

impl CallAssignmentRow {
    fn into_domain(self) -> CallAssignment {
        CallAssignment {
            id: self.id,
            date: self.date,
            person_id: self.person_id,
            call_type: parse_call_type(&self.call_type),
            is_weekend: self.is_weekend,
            is_holiday: self.is_holiday,
        }
    }
}

impl AssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Exposed so a caller that needs the assignment mutation and a
    /// sibling repository's write (e.g. the swap engine's `SwapRecord`
    /// status update) in one atomic transaction can `pool().begin()`
    /// itself rather than going through `apply_assignments`'s own.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn list_for_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Assignment>, StorageError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT a.id, a.block_id, a.person_id, a.rotation_id, a.notes, a.created_at, a.updated_at
            FROM assignments a JOIN blocks b ON b.id = a.block_id
            WHERE b.date BETWEEN $1 AND $2
            ORDER BY b.sequence_number
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(AssignmentRow::into_domain).collect())
    }

    pub async fn list_for_person_range(
        &self,
        person_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Assignment>, StorageError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT a.id, a.block_id, a.person_id, a.rotation_id, a.notes, a.created_at, a.updated_at
            FROM assignments a JOIN blocks b ON b.id = a.block_id
            WHERE a.person_id = $1 AND b.date BETWEEN $2 AND $3
            ORDER BY b.sequence_number
            "#,
        )
        .bind(person_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(AssignmentRow::into_domain).collect())
    }

    pub async fn list_call_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CallAssignment>, StorageError> {
        let rows = sqlx::query_as::<_, CallAssignmentRow>(
            "SELECT id, date, person_id, call_type, is_weekend, is_holiday
             FROM call_assignments WHERE date BETWEEN $1 AND $2 ORDER BY date",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(CallAssignmentRow::into_domain).collect())
    }

    /// Applies every mutation in a single transaction, recomputes the
    /// counters of every affected person inside that same transaction, and
    /// returns the store-assigned monotonic transaction id (spec §4.A,
    /// §5). Atomic: either every mutation lands or none does. Rejects with
    /// `Invariant` (no write) if the admission would push a person over the
    /// 80-hour cap or a block/rotation over its supervision ratio (spec §8
    /// scenarios 2 and 6).
    pub async fn apply_assignments(
        &self,
        mutations: &[AssignmentMutation],
        affected_person_ids: &[Uuid],
        person_repo: &PersonRepository,
        rotation_hour_weights: &HashMap<String, f64>,
    ) -> Result<i64, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Query)?;

        let transaction_id: (i64,) = sqlx::query_as("INSERT INTO transaction_log DEFAULT VALUES RETURNING id")
            .fetch_one(&mut *tx)
            .await
            .map_err(StorageError::Query)?;

        Self::apply_assignments_tx(&mut tx, mutations, affected_person_ids, person_repo, rotation_hour_weights).await?;

        tx.commit().await.map_err(StorageError::Query)?;

        tracing::info!(
            transaction_id = transaction_id.0,
            mutation_count = mutations.len(),
            affected_persons = affected_person_ids.len(),
            "applied assignment mutations"
        );

        Ok(transaction_id.0)
    }

    /// The mutation-and-recompute core of `apply_assignments`, taking an
    /// already-open transaction so a caller that needs a sibling write in
    /// the same atomic unit (the swap engine's `SwapRecord` status update,
    /// spec §4.D "Commit") can supply its own.
    pub async fn apply_assignments_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        mutations: &[AssignmentMutation],
        affected_person_ids: &[Uuid],
        person_repo: &PersonRepository,
        rotation_hour_weights: &HashMap<String, f64>,
    ) -> Result<(), StorageError> {
        Self::check_duty_hour_cap_tx(tx, mutations, rotation_hour_weights).await?;
        Self::check_supervision_ratio_tx(tx, mutations).await?;

        for mutation in mutations {
            match mutation {
                AssignmentMutation::UpsertAssignment {
                    id,
                    block_id,
                    person_id,
                    rotation_id,
                    notes,
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO assignments (id, block_id, person_id, rotation_id, notes, created_at, updated_at)
                        VALUES ($1, $2, $3, $4, $5, now(), now())
                        ON CONFLICT (person_id, block_id) DO UPDATE SET
                            rotation_id = EXCLUDED.rotation_id,
                            notes = EXCLUDED.notes,
                            updated_at = now()
                        "#,
                    )
                    .bind(id)
                    .bind(block_id)
                    .bind(person_id)
                    .bind(rotation_id)
                    .bind(notes)
                    .execute(&mut **tx)
                    .await
                    .map_err(StorageError::Query)?;
                }
                AssignmentMutation::DeleteAssignment { id } => {
                    sqlx::query("DELETE FROM assignments WHERE id = $1")
                        .bind(id)
                        .execute(&mut **tx)
                        .await
                        .map_err(StorageError::Query)?;
                }
                AssignmentMutation::UpsertCallAssignment {
                    id,
                    date,
                    call_type,
                    person_id,
                    is_weekend,
                    is_holiday,
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO call_assignments (id, date, call_type, person_id, is_weekend, is_holiday)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        ON CONFLICT (date, call_type) DO UPDATE SET
                            person_id = EXCLUDED.person_id,
                            is_weekend = EXCLUDED.is_weekend,
                            is_holiday = EXCLUDED.is_holiday
                        "#,
                    )
                    .bind(id)
                    .bind(date)
                    .bind(call_type_str(*call_type))
                    .bind(person_id)
                    .bind(is_weekend)
                    .bind(is_holiday)
                    .execute(&mut **tx)
                    .await
                    .map_err(StorageError::Query)?;
                }
                AssignmentMutation::DeleteCallAssignment { date, call_type } => {
                    sqlx::query("DELETE FROM call_assignments WHERE date = $1 AND call_type = $2")
                        .bind(date)
                        .bind(call_type_str(*call_type))
                        .execute(&mut **tx)
                        .await
                        .map_err(StorageError::Query)?;
                }
            }
        }

        for person_id in affected_person_ids {
            person_repo.recompute_counters_tx(tx, *person_id).await?;
        }

        Ok(())
    }

    /// Committed duty hours for `person_id` across `[window_start,
    /// window_start + 27 days]`, read inside `tx` so a pending admission
    /// check sees the pre-mutation state (spec §8 "sum(duty_hours(p, w)) /
    /// 4 <= 80").
    async fn duty_hours_in_window_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        person_id: Uuid,
        window_start: NaiveDate,
        rotation_hour_weights: &HashMap<String, f64>,
    ) -> Result<f64, StorageError> {
        let window_end = window_start + Duration::days(27);

        let categories: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT r.category
            FROM assignments a
            JOIN blocks b ON b.id = a.block_id
            JOIN rotations r ON r.id = a.rotation_id
            WHERE a.person_id = $1 AND b.date BETWEEN $2 AND $3
            "#,
        )
        .bind(person_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        let scheduled: f64 = categories
            .iter()
            .map(|(raw,)| rotation_hour_weights.get(parse_category(raw).config_key()).copied().unwrap_or(8.0) / 2.0)
            .sum();

        let call_count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM call_assignments WHERE person_id = $1 AND date BETWEEN $2 AND $3",
        )
        .bind(person_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_one(&mut **tx)
        .await
        .map_err(StorageError::Query)?;

        let call_hours = call_count.0 as f64 * rotation_hour_weights.get("Call").copied().unwrap_or(14.0);

        Ok(scheduled + call_hours)
    }

    /// Rejects an admission that would push the person's rolling 4-week
    /// average over the 80-hour cap (spec §8 scenario 2). Runs before any
    /// mutation in the batch is applied, so pending mutations in the same
    /// batch (e.g. a run of daily assignments for one resident) are folded
    /// into `hours_before` rather than checked against each other in
    /// isolation.
    async fn check_duty_hour_cap_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        mutations: &[AssignmentMutation],
        rotation_hour_weights: &HashMap<String, f64>,
    ) -> Result<(), StorageError> {
        let mut pending: Vec<(Uuid, NaiveDate, f64)> = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            let entry = match mutation {
                AssignmentMutation::UpsertAssignment { person_id, block_id, rotation_id, .. } => {
                    let block: Option<(NaiveDate,)> = sqlx::query_as("SELECT date FROM blocks WHERE id = $1")
                        .bind(block_id)
                        .fetch_optional(&mut **tx)
                        .await
                        .map_err(StorageError::Query)?;
                    let Some((date,)) = block else { continue };

                    let rotation: Option<(String,)> = sqlx::query_as("SELECT category FROM rotations WHERE id = $1")
                        .bind(rotation_id)
                        .fetch_optional(&mut **tx)
                        .await
                        .map_err(StorageError::Query)?;
                    let Some((category,)) = rotation else { continue };
                    let weight = rotation_hour_weights.get(parse_category(&category).config_key()).copied().unwrap_or(8.0) / 2.0;

                    (*person_id, date, weight)
                }
                AssignmentMutation::UpsertCallAssignment { person_id, date, .. } => {
                    (*person_id, *date, rotation_hour_weights.get("Call").copied().unwrap_or(14.0))
                }
                AssignmentMutation::DeleteAssignment { .. } | AssignmentMutation::DeleteCallAssignment { .. } => continue,
            };
            pending.push(entry);
        }

        for &(person_id, date, added_hours) in &pending {
            let window_start = date - Duration::days(27);
            let window_end = date;
            let hours_before = Self::duty_hours_in_window_tx(tx, person_id, window_start, rotation_hour_weights).await?;
            let batched: f64 = pending
                .iter()
                .filter(|&&(p, d, _)| p == person_id && d >= window_start && d <= window_end)
                .map(|&(_, _, h)| h)
                .sum();
            let hours_after = hours_before + batched;

            if hours_after / 4.0 > 80.0 {
                return Err(StorageError::invariant(
                    "admission would exceed the 80-hour duty cap",
                    PersonRepository::violation_context(hours_before / 4.0, hours_after / 4.0, 80.0),
                ));
            }
        }
        Ok(())
    }

    /// Rejects an admission that would push an Inpatient/Clinic rotation's
    /// per-block PGY:Faculty ratio past 2:1 (PGY-1) or 4:1 (PGY-2/3) (spec
    /// §4.B Tier-1 "Supervision ratios", §8 scenario 6).
    async fn check_supervision_ratio_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        mutations: &[AssignmentMutation],
    ) -> Result<(), StorageError> {
        for mutation in mutations {
            let AssignmentMutation::UpsertAssignment { person_id, block_id, rotation_id, .. } = mutation else { continue };

            let rotation: Option<(String,)> = sqlx::query_as("SELECT category FROM rotations WHERE id = $1")
                .bind(rotation_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(StorageError::Query)?;
            let Some((category,)) = rotation else { continue };
            if !matches!(parse_category(&category), RotationCategory::Inpatient | RotationCategory::Clinic) {
                continue;
            }

            let incoming: Option<(String, Option<i16>)> = sqlx::query_as("SELECT role_kind, pgy_level FROM people WHERE id = $1")
                .bind(person_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(StorageError::Query)?;
            let Some((role_kind, pgy_level)) = incoming else { continue };
            if role_kind != "resident" {
                continue;
            }

            let peers: Vec<(String, Option<i16>)> = sqlx::query_as(
                r#"
                SELECT p.role_kind, p.pgy_level
                FROM people p
                JOIN assignments a ON a.person_id = p.id
                WHERE a.block_id = $1 AND a.rotation_id = $2 AND a.person_id != $3
                "#,
            )
            .bind(block_id)
            .bind(rotation_id)
            .bind(person_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(StorageError::Query)?;

            let mut pgy1 = 0u32;
            let mut pgy23 = 0u32;
            let mut faculty = 0u32;
            for (role_kind, level) in &peers {
                if role_kind == "resident" {
                    match level {
                        Some(1) => pgy1 += 1,
                        Some(_) => pgy23 += 1,
                        None => {}
                    }
                } else {
                    faculty += 1;
                }
            }

            let (current_trainees, max_ratio, rule) = if pgy_level.unwrap_or_default() == 1 {
                (pgy1, 2u32, "PGY1_SUPERVISION")
            } else {
                (pgy23, 4u32, "PGY23_SUPERVISION")
            };
            let proposed_trainees = current_trainees + 1;

            if faculty == 0 || proposed_trainees > faculty * max_ratio {
                return Err(StorageError::invariant(
                    format!("supervision ratio {proposed_trainees}:{faculty} would exceed the maximum {max_ratio}:1"),
                    json!({
                        "rule": rule,
                        "current_ratio": format!("{current_trainees}:{faculty}"),
                        "proposed": format!("{proposed_trainees}:{faculty}"),
                    }),
                ));
            }
        }
        Ok(())
    }

    /// Current `(assignment_id, person_id)` pairs for a set of assignment
    /// ids, used to build a pre-mutation `Snapshot` (spec §4.A `snapshot`).
    pub async fn current_assignment_owners(&self, assignment_ids: &[Uuid]) -> Result<Vec<(Uuid, Uuid)>, StorageError> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT id, person_id FROM assignments WHERE id = ANY($1)",
        )
        .bind(assignment_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;
        Ok(rows)
    }

    /// The id of the existing assignment for `(person_id, block_id)`, if
    /// any — used by the swap engine to locate the row a mutation will
    /// upsert or delete.
    pub async fn find_id(&self, person_id: Uuid, block_id: Uuid) -> Result<Option<Uuid>, StorageError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM assignments WHERE person_id = $1 AND block_id = $2")
                .bind(person_id)
                .bind(block_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::Query)?;
        Ok(row.map(|(id,)| id))
    }

    pub async fn current_call_assignment_owners(
        &self,
        date_call_types: &[(NaiveDate, CallType)],
    ) -> Result<Vec<(Uuid, Uuid)>, StorageError> {
        let mut owners = Vec::with_capacity(date_call_types.len());
        for (date, call_type) in date_call_types {
            let row: Option<(Uuid, Uuid)> = sqlx::query_as(
                "SELECT id, person_id FROM call_assignments WHERE date = $1 AND call_type = $2",
            )
            .bind(date)
            .bind(call_type_str(*call_type))
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Query)?;
            if let Some(owner) = row {
                owners.push(owner);
            }
        }
        Ok(owners)
    }
}
