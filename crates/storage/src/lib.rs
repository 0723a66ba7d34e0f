//! Storage layer for the residency scheduling core.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod absence_repository;
pub mod assignment_repository;
pub mod audit_repository;
pub mod block_repository;
pub mod error;
pub mod person_repository;
pub mod rotation_repository;
pub mod snapshot_repository;
pub mod swap_repository;

pub use absence_repository::AbsenceRepository;
pub use assignment_repository::{AssignmentMutation, AssignmentRepository};
pub use audit_repository::AuditRepository;
pub use block_repository::BlockRepository;
pub use error::StorageError;
pub use person_repository::PersonRepository;
pub use rotation_repository::RotationRepository;
pub use snapshot_repository::SnapshotRepository;
pub use swap_repository::SwapRepository;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool, StorageError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(StorageError::Connection)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(StorageError::Migration)
}

/// Check database connectivity.
pub async fn check_connection(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(StorageError::Query)?;
    Ok(())
}
