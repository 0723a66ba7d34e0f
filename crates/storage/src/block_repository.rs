//! Block reads.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use residency_domain::{Block, Session};

use crate::StorageError;

#[derive(Clone)]
pub struct BlockRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct BlockRow {
    id: Uuid,
    date: NaiveDate,
    session: String,
    sequence_number: i32,
    is_weekend: bool,
    is_holiday: bool,
    holiday_name: Option<String>,
}

impl BlockRow {
    fn into_domain(self) -> Block {
        Block {
            id: self.id,
            date: self.date,
            session: if self.session == "AM" { Session::Am } else { Session::Pm },
            sequence_number: self.sequence_number.max(0) as u32,
            is_weekend: self.is_weekend,
            is_holiday: self.is_holiday,
            holiday_name: self.holiday_name,
        }
    }
}

impl BlockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Block, StorageError> {
        let row = sqlx::query_as::<_, BlockRow>(
            "SELECT id, date, session, sequence_number, is_weekend, is_holiday, holiday_name
             FROM blocks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Query)?
        .ok_or_else(|| StorageError::NotFound {
            entity: "Block".to_string(),
            id: id.to_string(),
        })?;

        Ok(row.into_domain())
    }

    pub async fn list_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Block>, StorageError> {
        let rows = sqlx::query_as::<_, BlockRow>(
            "SELECT id, date, session, sequence_number, is_weekend, is_holiday, holiday_name
             FROM blocks WHERE date BETWEEN $1 AND $2
             ORDER BY sequence_number",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Query)?;

        Ok(rows.into_iter().map(BlockRow::into_domain).collect())
    }

    /// Inserts any AM/PM blocks missing from `[start, end]`, assigning each
    /// a fresh `sequence_number` that continues from the current max (spec
    /// §4.C.1 preprocessing "creating any missing" blocks). Idempotent: a
    /// repeat call over an already-covered range inserts nothing.
    pub async fn ensure_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Block>, StorageError> {
        use chrono::Duration;

        let next_sequence: (Option<i32>,) = sqlx::query_as("SELECT MAX(sequence_number) FROM blocks")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Query)?;
        let mut sequence = next_sequence.0.unwrap_or(0);

        let mut date = start;
        while date <= end {
            for session in [Session::Am, Session::Pm] {
                sequence += 1;
                let block = Block::new(Uuid::new_v4(), date, session, sequence as u32);
                sqlx::query(
                    r#"
                    INSERT INTO blocks (id, date, session, sequence_number, is_weekend, is_holiday, holiday_name)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (date, session) DO NOTHING
                    "#,
                )
                .bind(block.id)
                .bind(block.date)
                .bind(if block.session == Session::Am { "AM" } else { "PM" })
                .bind(block.sequence_number as i32)
                .bind(block.is_weekend)
                .bind(block.is_holiday)
                .bind(&block.holiday_name)
                .execute(&self.pool)
                .await
                .map_err(StorageError::Query)?;
            }
            date += Duration::days(1);
        }

        self.list_range(start, end).await
    }
}
