//! SwapRecord: audit entity for swap execution (spec §3, §4.D).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One-to-one exchange between two people, or an Absorb (give-away with no
/// replacement) (spec §GLOSSARY "Swap").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwapType {
    OneToOne,
    Absorb,
}

/// Status transitions form a strict DAG (spec §3):
/// `Pending -> {Approved, Rejected, Cancelled}`, `Approved -> Executed`,
/// `Executed -> RolledBack` (within the rollback window only). Terminal
/// states admit no further transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    RolledBack,
    Cancelled,
}

impl SwapStatus {
    /// Whether `next` is a legal transition from `self`, per the DAG in
    /// spec §3.
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        use SwapStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Pending, Cancelled)
                | (Approved, Executed)
                | (Executed, RolledBack)
        )
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapStatus::Rejected | SwapStatus::RolledBack | SwapStatus::Cancelled
        )
    }
}

/// Audit record for a swap request, its decision, and its execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRecord {
    pub id: Uuid,
    pub swap_type: SwapType,
    pub source_person_id: Uuid,
    pub source_week_start: NaiveDate,
    pub target_person_id: Option<Uuid>,
    pub target_week_start: Option<NaiveDate>,
    pub status: SwapStatus,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub requested_by: Uuid,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub executed_at: Option<DateTime<Utc>>,
    pub executed_by: Option<Uuid>,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub rolled_back_by: Option<Uuid>,
    pub rollback_reason: Option<String>,
    /// Store-assigned transaction id of the commit that executed this swap
    /// (spec §3, §4.A "monotonically increasing transaction id").
    pub transaction_id: Option<i64>,
}

impl SwapRecord {
    /// A swap can be rolled back iff `status == Executed` and `now -
    /// executed_at <= rollback_window` (spec §8 universal invariant).
    pub fn is_rollback_eligible(&self, now: DateTime<Utc>, rollback_window: chrono::Duration) -> bool {
        match (self.status, self.executed_at) {
            (SwapStatus::Executed, Some(executed_at)) => now - executed_at <= rollback_window,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_dag_rejects_illegal_transitions() {
        assert!(SwapStatus::Pending.can_transition_to(SwapStatus::Approved));
        assert!(SwapStatus::Approved.can_transition_to(SwapStatus::Executed));
        assert!(SwapStatus::Executed.can_transition_to(SwapStatus::RolledBack));
        assert!(!SwapStatus::Pending.can_transition_to(SwapStatus::Executed));
        assert!(!SwapStatus::RolledBack.can_transition_to(SwapStatus::Executed));
        assert!(!SwapStatus::Rejected.can_transition_to(SwapStatus::Approved));
    }

    #[test]
    fn terminal_states_have_no_further_transitions() {
        assert!(SwapStatus::Rejected.is_terminal());
        assert!(SwapStatus::RolledBack.is_terminal());
        assert!(SwapStatus::Cancelled.is_terminal());
        assert!(!SwapStatus::Executed.is_terminal());
    }
}
