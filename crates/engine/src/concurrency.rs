//! Person-level mutual exclusion across swaps and generation runs (spec §5
//! "Shared resource policy", "a swap whose affected weeks overlap an
//! in-flight swap or generation for any of the same persons fails with
//! Conflict"), generalized from the generator's own idempotency `DashMap`
//! (`generator::registry::RunRegistry`) from a keyed cache to a keyed lock.

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use uuid::Uuid;

use residency_domain::{CoreError, ErrorDetails};

#[derive(Clone, Default)]
pub struct PersonLocks {
    held: Arc<DashMap<Uuid, (NaiveDate, NaiveDate)>>,
}

/// Releases every lock it holds when dropped, so a failed or short-circuited
/// operation never leaves a person wedged.
pub struct LockGuard {
    held: Arc<DashMap<Uuid, (NaiveDate, NaiveDate)>>,
    person_ids: Vec<Uuid>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        for person_id in &self.person_ids {
            self.held.remove(person_id);
        }
    }
}

impl PersonLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every person in `person_ids` for `[start, end]`, failing with
    /// `Conflict` if any of them is already locked for an overlapping range.
    pub fn acquire(&self, person_ids: &[Uuid], start: NaiveDate, end: NaiveDate) -> Result<LockGuard, CoreError> {
        for person_id in person_ids {
            if let Some(existing) = self.held.get(person_id) {
                let (existing_start, existing_end) = *existing;
                if start <= existing_end && existing_start <= end {
                    return Err(CoreError::Conflict {
                        message: format!("person {person_id} has an in-flight operation over an overlapping window"),
                        details: ErrorDetails::from_value(serde_json::json!({ "kind": "person_in_flight", "person_id": person_id.to_string() })),
                    });
                }
            }
        }

        for person_id in person_ids {
            self.held.insert(*person_id, (start, end));
        }

        Ok(LockGuard { held: Arc::clone(&self.held), person_ids: person_ids.to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_window_for_same_person_is_rejected() {
        let locks = PersonLocks::new();
        let person = Uuid::new_v4();
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        let _guard = locks.acquire(&[person], start, end).unwrap();

        let second = locks.acquire(&[person], start, end);
        assert!(matches!(second, Err(CoreError::Conflict { .. })));
    }

    #[test]
    fn lock_releases_on_drop() {
        let locks = PersonLocks::new();
        let person = Uuid::new_v4();
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        {
            let _guard = locks.acquire(&[person], start, end).unwrap();
        }
        assert!(locks.acquire(&[person], start, end).is_ok());
    }
}
