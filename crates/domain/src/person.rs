//! Person entity: residents and faculty.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// PGY (post-graduate year) training level. This program runs PGY-1 through
/// PGY-3 (spec §GLOSSARY).
pub type PgyLevel = u8;

/// Faculty role tag, e.g. Program Director, Associate PD, core faculty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FacultyRoleTag {
    ProgramDirector,
    AssociateProgramDirector,
    Core,
    SportsMed,
    Other(String),
}

/// A person's role — a Resident has a PGY level; a Faculty member does not
/// (spec §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersonRole {
    Resident { pgy_level: PgyLevel },
    Faculty {
        role_tag: FacultyRoleTag,
        specialties: HashSet<String>,
    },
}

impl PersonRole {
    pub fn pgy_level(&self) -> Option<PgyLevel> {
        match self {
            PersonRole::Resident { pgy_level } => Some(*pgy_level),
            PersonRole::Faculty { .. } => None,
        }
    }

    pub fn is_faculty(&self) -> bool {
        matches!(self, PersonRole::Faculty { .. })
    }

    pub fn is_resident(&self) -> bool {
        matches!(self, PersonRole::Resident { .. })
    }
}

/// Monotonic call-equity counters, maintained only by the store on commit
/// (spec §3: "Counters are non-negative and derivable from assignments").
/// These are a cached projection of the Assignment/CallAssignment tables,
/// never independently mutated (spec §5 "Shared resource policy").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallEquityCounters {
    pub sunday_call_count: u32,
    pub weekday_call_count: u32,
    pub fmit_week_count: u32,
}

/// Lifecycle state of a Person record. Logically deleted (tombstoned) rather
/// than hard-deleted once referenced by assignments (spec §3 "Lifecycle").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersonStatus {
    Active,
    Tombstoned,
}

/// A resident or faculty member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub display_name: String,
    pub role: PersonRole,
    pub email: String,
    pub counters: CallEquityCounters,
    pub status: PersonStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    pub fn pgy_level(&self) -> Option<PgyLevel> {
        self.role.pgy_level()
    }

    pub fn is_active(&self) -> bool {
        self.status == PersonStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resident_has_pgy_level_faculty_does_not() {
        let resident = PersonRole::Resident { pgy_level: 2 };
        assert_eq!(resident.pgy_level(), Some(2));

        let faculty = PersonRole::Faculty {
            role_tag: FacultyRoleTag::Core,
            specialties: HashSet::new(),
        };
        assert_eq!(faculty.pgy_level(), None);
        assert!(faculty.is_faculty());
    }
}
