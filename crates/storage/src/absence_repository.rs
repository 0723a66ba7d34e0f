//! Absence reads.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use residency_domain::{Absence, AbsenceKind};

use crate::StorageError;

#[derive(Clone)]
pub struct AbsenceRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct AbsenceRow {
    id: Uuid,
    person_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    kind: String,
    blocking: bool,
}

fn parse_kind(raw: &str) -> AbsenceKind {
    match raw {
        "vacation" => AbsenceKind::Vacation,
        "conference" => AbsenceKind::Conference,
        "sick" => AbsenceKind::Sick,
        "parental" => AbsenceKind::Parental,
        "tdy" => AbsenceKind::Tdy,
        "deployment" => AbsenceKind::Deployment,
        "hard_preference" => AbsenceKind::HardPreference,
        _ => AbsenceKind::Other,
    }
}

impl AbsenceRow {
    fn into_domain(self) -> Absence {
        Absence {
            id: self.id,
            person_id: self.person_id,
            start_date: self.start_date,
            end_date: self.end_date,
            kind: parse_kind(&self.kind),
            blocking: self.blocking,
        }
    }
}

impl AbsenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Absences overlapping `[start, end]` for any person in `person_ids`
    /// (empty slice means "everyone").
    pub async fn list_overlapping(
        &self,
        person_ids: &[Uuid],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Absence>, StorageError> {
        let rows = sqlx::query_as::<_, AbsenceRow>(
            r#"
            SELECT id, person_id, start_date, end_date, kind, blocking
            FROM absences
            WHERE start_date <= $2 AND end_date >= $1
              AND ($3::uuid[] IS NULL OR cardinality($3) = 0 OR person_id = ANY($3))
            ORDER BY start_date
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(person_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(AbsenceRow::into_domain).collect())
    }

    pub async fn list_for_person(&self, person_id: Uuid) -> Result<Vec<Absence>, StorageError> {
        let rows = sqlx::query_as::<_, AbsenceRow>(
            "SELECT id, person_id, start_date, end_date, kind, blocking
             FROM absences WHERE person_id = $1 ORDER BY start_date",
        )
        .bind(person_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(AbsenceRow::into_domain).collect())
    }
}
