//! Snapshot: pre-execution state capture tied 1:1 to an executed SwapRecord.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One captured assignment or call assignment prior to a swap's execution:
/// `(entity id, prior person id)` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub entity_id: Uuid,
    pub prior_person_id: Uuid,
}

/// Consistent point-in-time capture of the Assignment/CallAssignment tuples
/// for the affected weeks, retained for at least the rollback window
/// (spec §3, §4.A `snapshot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub swap_id: Uuid,
    pub assignment_entries: Vec<SnapshotEntry>,
    pub call_assignment_entries: Vec<SnapshotEntry>,
    pub taken_at: chrono::DateTime<chrono::Utc>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.assignment_entries.is_empty() && self.call_assignment_entries.is_empty()
    }
}
