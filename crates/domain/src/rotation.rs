//! Rotation / RotationTemplate: canonical type of clinical duty.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rotation category (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RotationCategory {
    Inpatient,
    Clinic,
    NightFloat,
    Call,
    Procedures,
    Emergency,
    Other(String),
}

impl RotationCategory {
    /// Stable lookup key into `EngineConfig::rotation_hour_weights`.
    pub fn config_key(&self) -> &str {
        match self {
            RotationCategory::Inpatient => "Inpatient",
            RotationCategory::Clinic => "Clinic",
            RotationCategory::NightFloat => "NightFloat",
            RotationCategory::Call => "Call",
            RotationCategory::Procedures => "Procedures",
            RotationCategory::Emergency => "Emergency",
            RotationCategory::Other(name) => name.as_str(),
        }
    }
}

/// Required qualification set a rotation demands of anyone assigned to it
/// (spec §3, §4.B Tier-1 "Qualification match").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequiredQualifications {
    /// Minimum PGY level a resident must have to be assigned (faculty are
    /// exempt from this check).
    pub min_pgy_level: Option<u8>,
    /// Certification tags a person must carry (e.g. "ACLS").
    pub certifications: Vec<String>,
    /// Whether supervisory clearance is required.
    pub requires_clearance: bool,
}

/// Canonical rotation definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationTemplate {
    pub id: Uuid,
    pub name: String,
    pub category: RotationCategory,
    pub required_qualifications: RequiredQualifications,
    /// Minimum coverage target per block (spec §4.B Tier-2 "Minimum coverage").
    pub min_coverage: u32,
    /// Maximum coverage cap per block.
    pub max_coverage: u32,
}

impl RotationTemplate {
    /// Whether a person with the given role/certifications/clearance
    /// satisfies this rotation's qualification set (spec §3 Assignment
    /// invariant, §4.B Tier-1 "Qualification match").
    pub fn is_satisfied_by(
        &self,
        pgy_level: Option<u8>,
        certifications: &[String],
        has_clearance: bool,
    ) -> bool {
        if let Some(min_pgy) = self.required_qualifications.min_pgy_level {
            match pgy_level {
                Some(level) if level >= min_pgy => {}
                Some(_) => return false,
                // Faculty (no PGY level) satisfy PGY-gated rotations only
                // when the rotation does not require a specific PGY floor
                // above entry level; a rotation requiring a PGY level is a
                // resident-only rotation.
                None => return false,
            }
        }

        if self.required_qualifications.requires_clearance && !has_clearance {
            return false;
        }

        self.required_qualifications
            .certifications
            .iter()
            .all(|required| certifications.iter().any(|held| held == required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(min_pgy: Option<u8>, certs: Vec<String>) -> RotationTemplate {
        RotationTemplate {
            id: Uuid::new_v4(),
            name: "Test Rotation".to_string(),
            category: RotationCategory::Inpatient,
            required_qualifications: RequiredQualifications {
                min_pgy_level: min_pgy,
                certifications: certs,
                requires_clearance: false,
            },
            min_coverage: 1,
            max_coverage: 4,
        }
    }

    #[test]
    fn pgy_floor_is_enforced() {
        let rotation = template(Some(2), vec![]);
        assert!(!rotation.is_satisfied_by(Some(1), &[], false));
        assert!(rotation.is_satisfied_by(Some(2), &[], false));
        assert!(rotation.is_satisfied_by(Some(3), &[], false));
    }

    #[test]
    fn missing_certification_fails() {
        let rotation = template(None, vec!["ACLS".to_string()]);
        assert!(!rotation.is_satisfied_by(Some(1), &[], false));
        assert!(rotation.is_satisfied_by(Some(1), &["ACLS".to_string()], false));
    }
}
