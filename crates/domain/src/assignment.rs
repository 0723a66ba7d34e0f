//! Assignment: links Person → Block → Rotation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Links a person to a block under a rotation (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub block_id: Uuid,
    pub person_id: Uuid,
    pub rotation_id: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Overnight/weekend call type (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Overnight,
    Weekend,
    Backup,
}

/// Overnight/weekend call assignment; only Faculty may appear (spec §3
/// invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAssignment {
    pub id: Uuid,
    pub date: chrono::NaiveDate,
    pub person_id: Uuid,
    pub call_type: CallType,
    pub is_weekend: bool,
    pub is_holiday: bool,
}
