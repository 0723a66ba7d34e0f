//! Absence: approved unavailability.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reason for an absence (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceKind {
    Vacation,
    Conference,
    Sick,
    Parental,
    Tdy,
    Deployment,
    HardPreference,
    Other,
}

impl AbsenceKind {
    /// Deployment/Vacation/Sick are blocking; Conference/TDY are partial at
    /// the caller's choice (spec §3). `HardPreference`/`Other` default to
    /// non-blocking unless the caller overrides via `Absence::blocking`.
    pub fn default_blocking(&self) -> bool {
        matches!(
            self,
            AbsenceKind::Deployment | AbsenceKind::Vacation | AbsenceKind::Sick
        )
    }
}

/// Approved unavailability for a person over `[start_date, end_date]`
/// (spec §3 invariant: `start_date <= end_date`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Absence {
    pub id: Uuid,
    pub person_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub kind: AbsenceKind,
    pub blocking: bool,
}

impl Absence {
    pub fn new(id: Uuid, person_id: Uuid, start_date: NaiveDate, end_date: NaiveDate, kind: AbsenceKind) -> Self {
        let blocking = kind.default_blocking();
        Self {
            id,
            person_id,
            start_date,
            end_date,
            kind,
            blocking,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_blocks_by_default() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let absence = Absence::new(Uuid::new_v4(), Uuid::new_v4(), start, end, AbsenceKind::Deployment);
        assert!(absence.blocking);
        assert!(absence.covers(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()));
        assert!(!absence.covers(NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()));
    }

    #[test]
    fn conference_is_non_blocking_by_default() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let absence = Absence::new(Uuid::new_v4(), Uuid::new_v4(), start, start, AbsenceKind::Conference);
        assert!(!absence.blocking);
    }
}
