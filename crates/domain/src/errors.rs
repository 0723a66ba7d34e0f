//! `CoreError`: the closed error-kind enum that crosses every crate boundary
//! in this workspace (spec §7).

use serde::Serialize;

/// Structured, closed-schema error payload carried by every `CoreError`
/// variant (spec §7: "The user-visible shape is a kind plus structured
/// details, never a free-form string").
#[derive(Debug, Clone, Serialize, Default)]
pub struct ErrorDetails(pub serde_json::Value);

impl ErrorDetails {
    pub fn empty() -> Self {
        Self(serde_json::json!({}))
    }

    pub fn from_value(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// The eight error kinds named in spec §7, each carrying structured
/// `details` rather than an opaque string.
#[derive(Debug, thiserror::Error, Clone, Serialize)]
pub enum CoreError {
    /// A data invariant (spec §3/§8) was violated by the caller's input or
    /// by state the store would otherwise have accepted.
    #[error("invariant violated: {message}")]
    Invariant {
        message: String,
        details: ErrorDetails,
    },

    /// A referenced entity does not exist (or is tombstoned and the caller
    /// required it active).
    #[error("not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    /// The requested mutation conflicts with another in-flight mutation
    /// touching the same person/date/idempotency key (spec §5).
    #[error("conflict: {message}")]
    Conflict {
        message: String,
        details: ErrorDetails,
    },

    /// The generator could not produce a schedule satisfying every Tier-1
    /// constraint within its search budget (spec §4.C).
    #[error("infeasible: {message}")]
    Infeasible {
        message: String,
        /// Tier-1 violations that made every candidate assignment fail,
        /// serialized as JSON for transport-agnostic reporting.
        unsatisfiable_constraints: Vec<String>,
    },

    /// An operation exceeded its configured deadline (generator timeout,
    /// solver search budget).
    #[error("timeout after {elapsed_ms}ms: {message}")]
    Timeout { message: String, elapsed_ms: u64 },

    /// The caller's identity could not be established. Out of scope for
    /// this workspace's own enforcement (no auth layer), retained so a
    /// transport collaborator has a kind to map to 401.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The caller is known but not permitted to perform this operation
    /// (e.g. approving a swap above their escalation tier).
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// A transient failure (lock contention, connection drop) that the
    /// internal bounded retry already exhausted (spec §7.1).
    #[error("transient failure after {attempts} attempts: {message}")]
    Transient { message: String, attempts: u32 },
}

impl CoreError {
    pub fn invariant(message: impl Into<String>) -> Self {
        CoreError::Invariant {
            message: message.into(),
            details: ErrorDetails::empty(),
        }
    }

    pub fn invariant_with(message: impl Into<String>, details: serde_json::Value) -> Self {
        CoreError::Invariant {
            message: message.into(),
            details: ErrorDetails::from_value(details),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CoreError::Conflict {
            message: message.into(),
            details: ErrorDetails::empty(),
        }
    }

    /// The short, stable kind tag a transport collaborator would map to a
    /// status code or a client-visible discriminant.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            CoreError::Invariant { .. } => "invariant",
            CoreError::NotFound { .. } => "not_found",
            CoreError::Conflict { .. } => "conflict",
            CoreError::Infeasible { .. } => "infeasible",
            CoreError::Timeout { .. } => "timeout",
            CoreError::Unauthorized { .. } => "unauthorized",
            CoreError::Forbidden { .. } => "forbidden",
            CoreError::Transient { .. } => "transient",
        }
    }

    /// Whether retrying the same operation unchanged could plausibly
    /// succeed (spec §7: only `Transient` and, for the generator's solver
    /// budget, `Timeout` are retryable).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient { .. } | CoreError::Timeout { .. })
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            other => CoreError::Transient {
                message: other.to_string(),
                attempts: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_timeout_are_retryable() {
        let transient = CoreError::Transient {
            message: "x".to_string(),
            attempts: 3,
        };
        assert!(transient.is_retryable());

        let timeout = CoreError::Timeout {
            message: "x".to_string(),
            elapsed_ms: 1000,
        };
        assert!(timeout.is_retryable());

        assert!(!CoreError::invariant("x").is_retryable());
    }

    #[test]
    fn kind_tag_is_stable() {
        assert_eq!(CoreError::invariant("x").kind_tag(), "invariant");
        assert_eq!(
            CoreError::not_found("Person", "abc").kind_tag(),
            "not_found"
        );
    }
}
