//! Append-only audit event log entity (spec §4.D "Audit", §6 `audit_events`,
//! §1.2 "Audit event log as a first-class read model").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four audit event kinds a swap's lifecycle emits (spec §4.D
/// "Append structured events (Request, Validation, Decision, Execution)").
/// Generation runs and rollbacks emit the same kinds against a different
/// correlation id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEventKind {
    Request { payload: serde_json::Value },
    Validation { summary: serde_json::Value },
    Decision { outcome: String },
    Execution { transaction_id: i64 },
    Rollback { reason: String },
    /// Emitted when the auto-detection sweep (spec §4.D) forces a rollback.
    AutoRollback { reason: String },
    /// Emitted when a swap rollback itself fails, leaving the swap in
    /// `Pending` (spec §7 "Propagation policy").
    Escalation { severity: String, message: String },
}

/// One append-only audit entry, totally ordered within a correlation id by
/// `transaction_id` (spec §5 "Ordering guarantees").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    /// Correlates all events for one swap, one generation run, or one
    /// rollback.
    pub correlation_id: Uuid,
    pub kind: AuditEventKind,
    pub actor_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
    pub transaction_id: i64,
}
