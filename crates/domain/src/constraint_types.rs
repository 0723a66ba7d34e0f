//! Shared vocabulary of the constraint framework (spec §4.B).
//!
//! This module carries only the *types* every constraint and every caller
//! agrees on; the catalog of actual rules and the evaluator live in
//! `residency-constraints`, which depends on this crate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Constraint tier: 1 (Absolute, no override), 2 (Institutional,
/// hard-with-override), 3 (Optimization, soft/penalty-only) (spec §4.B).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Absolute = 1,
    Institutional = 2,
    Optimization = 3,
}

/// Whether a violation makes the schedule invalid (`Hard`) or merely
/// accumulates a penalty (`Soft`) (spec §4.B).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Hard,
    Soft,
}

/// The scope a constraint is evaluated over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Global,
    Person(Uuid),
    Rotation(Uuid),
    Block(Uuid),
    /// A rolling/calendar week identified by its Monday.
    Week(chrono::NaiveDate),
}

/// Violation severity (spec §4.B "A violation carries ... severity
/// (error/warning/info)").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Entities a violation names, so callers can act on it without parsing a
/// message string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffectedEntities {
    pub person_ids: Vec<Uuid>,
    pub block_ids: Vec<Uuid>,
    pub rotation_ids: Vec<Uuid>,
}

impl AffectedEntities {
    pub fn person(person_id: Uuid) -> Self {
        Self {
            person_ids: vec![person_id],
            ..Default::default()
        }
    }

    pub fn person_and_block(person_id: Uuid, block_id: Uuid) -> Self {
        Self {
            person_ids: vec![person_id],
            block_ids: vec![block_id],
            rotation_ids: vec![],
        }
    }
}

/// A single rule violation: the closed-schema tagged variant that replaces
/// free-form dict payloads (spec §9 "Dynamic/duck-typed records ...
/// modeled as tagged variants over a closed schema").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub constraint_id: String,
    pub tier: Tier,
    pub kind: ConstraintKind,
    pub severity: Severity,
    pub affected: AffectedEntities,
    /// Quantitative context (e.g. computed hours), a closed JSON value
    /// rather than a string-typed dict.
    pub context: serde_json::Value,
    /// Soft-constraint penalty; 0 for hard constraints (spec §4.B).
    pub penalty: f64,
    pub message: String,
}

/// Aggregate result of one `evaluate()` call (spec §4.B "Aggregate
/// evaluation API"). Hard violations are collected exhaustively, never
/// short-circuited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub violations: Vec<Violation>,
    pub total_penalty: f64,
    pub tier_breakdown: TierBreakdown,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub tier1_violations: u32,
    pub tier2_violations: u32,
    pub tier3_violations: u32,
}

impl EvaluationResult {
    pub fn merge(&mut self, other: EvaluationResult) {
        self.total_penalty += other.total_penalty;
        self.tier_breakdown.tier1_violations += other.tier_breakdown.tier1_violations;
        self.tier_breakdown.tier2_violations += other.tier_breakdown.tier2_violations;
        self.tier_breakdown.tier3_violations += other.tier_breakdown.tier3_violations;
        self.violations.extend(other.violations);
    }

    pub fn push(&mut self, violation: Violation) {
        self.total_penalty += violation.penalty;
        match violation.tier {
            Tier::Absolute => self.tier_breakdown.tier1_violations += 1,
            Tier::Institutional => self.tier_breakdown.tier2_violations += 1,
            Tier::Optimization => self.tier_breakdown.tier3_violations += 1,
        }
        self.violations.push(violation);
    }

    pub fn has_hard_violations(&self) -> bool {
        self.violations
            .iter()
            .any(|v| matches!(v.kind, ConstraintKind::Hard))
    }

    pub fn hard_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| matches!(v.kind, ConstraintKind::Hard))
    }

    pub fn tier1_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.tier == Tier::Absolute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(tier: Tier, kind: ConstraintKind, penalty: f64) -> Violation {
        Violation {
            constraint_id: "TEST".to_string(),
            tier,
            kind,
            severity: Severity::Error,
            affected: AffectedEntities::default(),
            context: serde_json::json!({}),
            penalty,
            message: "test".to_string(),
        }
    }

    #[test]
    fn push_accumulates_penalty_and_tier_breakdown() {
        let mut result = EvaluationResult::default();
        result.push(violation(Tier::Absolute, ConstraintKind::Hard, 0.0));
        result.push(violation(Tier::Optimization, ConstraintKind::Soft, 2.5));

        assert_eq!(result.tier_breakdown.tier1_violations, 1);
        assert_eq!(result.tier_breakdown.tier3_violations, 1);
        assert_eq!(result.total_penalty, 2.5);
        assert!(result.has_hard_violations());
    }
}
