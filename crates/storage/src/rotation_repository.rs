//! RotationTemplate reads.

use sqlx::PgPool;
use uuid::Uuid;

use residency_domain::{RequiredQualifications, RotationCategory, RotationTemplate};

use crate::StorageError;

#[derive(Clone)]
pub struct RotationRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct RotationRow {
    id: Uuid,
    name: String,
    category: String,
    min_pgy_level: Option<i16>,
    certifications: Vec<String>,
    requires_clearance: bool,
    min_coverage: i32,
    max_coverage: i32,
}

impl RotationRow {
    fn into_domain(self) -> RotationTemplate {
        RotationTemplate {
            id: self.id,
            name: self.name,
            category: parse_category(&self.category),
            required_qualifications: RequiredQualifications {
                min_pgy_level: self.min_pgy_level.map(|l| l as u8),
                certifications: self.certifications,
                requires_clearance: self.requires_clearance,
            },
            min_coverage: self.min_coverage.max(0) as u32,
            max_coverage: self.max_coverage.max(0) as u32,
        }
    }
}

pub(crate) fn parse_category(raw: &str) -> RotationCategory {
    match raw {
        "inpatient" => RotationCategory::Inpatient,
        "clinic" => RotationCategory::Clinic,
        "night_float" => RotationCategory::NightFloat,
        "call" => RotationCategory::Call,
        "procedures" => RotationCategory::Procedures,
        "emergency" => RotationCategory::Emergency,
        other => RotationCategory::Other(other.to_string()),
    }
}

impl RotationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<RotationTemplate, StorageError> {
        let row = sqlx::query_as::<_, RotationRow>(
            r#"
            SELECT id, name, category, min_pgy_level, certifications, requires_clearance,
                   min_coverage, max_coverage
            FROM rotations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?
        .ok_or_else(|| StorageError::NotFound {
            entity: "RotationTemplate".to_string(),
            id: id.to_string(),
        })?;

        Ok(row.into_domain())
    }

    pub async fn list_all(&self) -> Result<Vec<RotationTemplate>, StorageError> {
        let rows = sqlx::query_as::<_, RotationRow>(
            r#"
            SELECT id, name, category, min_pgy_level, certifications, requires_clearance,
                   min_coverage, max_coverage
            FROM rotations ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(RotationRow::into_domain).collect())
    }

    pub async fn list_by_ids(&self, ids: &[Uuid]) -> Result<Vec<RotationTemplate>, StorageError> {
        let rows = sqlx::query_as::<_, RotationRow>(
            r#"
            SELECT id, name, category, min_pgy_level, certifications, requires_clearance,
                   min_coverage, max_coverage
            FROM rotations WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(RotationRow::into_domain).collect())
    }
}
