//! Storage errors.

use residency_domain::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    #[error("query error: {0}")]
    Query(#[source] sqlx::Error),

    #[error("row not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    /// A write was rejected by a database constraint that encodes one of
    /// the domain invariants (unique `(person, block)`, unique `(date,
    /// call_type)`, supervision-ratio trigger, 80-hour admission cap, ...).
    #[error("invariant violated: {message}")]
    Invariant {
        message: String,
        details: serde_json::Value,
    },
}

impl StorageError {
    pub fn invariant(message: impl Into<String>, details: serde_json::Value) -> Self {
        StorageError::Invariant {
            message: message.into(),
            details,
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StorageError::Invariant { message, details } => CoreError::invariant_with(message, details),
            StorageError::Connection(source) | StorageError::Query(source) => CoreError::Transient {
                message: source.to_string(),
                attempts: 1,
            },
            StorageError::Migration(source) => CoreError::Transient {
                message: source.to_string(),
                attempts: 1,
            },
        }
    }
}
