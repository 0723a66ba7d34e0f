//! Block: a half-day scheduling slot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Half-day session (spec §GLOSSARY "Block").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Session {
    Am,
    Pm,
}

/// A half-day slot. `(date, session)` is unique; `sequence_number` is
/// strictly increasing in `(date, session)` (spec §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub date: NaiveDate,
    pub session: Session,
    /// Sequential number within the academic year, 1..~730.
    pub sequence_number: u32,
    pub is_weekend: bool,
    pub is_holiday: bool,
    pub holiday_name: Option<String>,
}

impl Block {
    pub fn new(id: Uuid, date: NaiveDate, session: Session, sequence_number: u32) -> Self {
        use chrono::Weekday;
        let is_weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        Self {
            id,
            date,
            session,
            sequence_number,
            is_weekend,
            is_holiday: false,
            holiday_name: None,
        }
    }

    pub fn with_holiday(mut self, name: impl Into<String>) -> Self {
        self.is_holiday = true;
        self.holiday_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn weekend_flag_is_derived_from_date() {
        // 2025-02-01 is a Saturday.
        let saturday = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let block = Block::new(Uuid::new_v4(), saturday, Session::Am, 1);
        assert!(block.is_weekend);

        // 2025-02-03 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let block = Block::new(Uuid::new_v4(), monday, Session::Am, 5);
        assert!(!block.is_weekend);
    }
}
