//! External-interface payload shapes (spec §6): the request/response types
//! that cross the `residency-engine::Engine` boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::constraint_types::Violation;
use crate::swap_record::SwapType;

/// Solver selector (spec §4.C).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Greedy,
    ExactCp,
    Milp,
    Hybrid,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Hybrid
    }
}

/// Per-person, per-window opaque moonlighting contribution folded into the
/// 80-hour rolling window (spec §1.2, §9 open question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoonlightingContribution {
    pub person_id: Uuid,
    pub hours: f64,
}

/// `{start_date, end_date, algorithm, timeout_seconds, pgy_levels?,
/// rotation_ids?, idempotency_key?}` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub algorithm: Algorithm,
    #[validate(range(min = 5, max = 300))]
    pub timeout_seconds: u32,
    pub pgy_levels: Option<Vec<u8>>,
    pub rotation_ids: Option<Vec<Uuid>>,
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub moonlighting: Vec<MoonlightingContribution>,
}

/// Outcome of a generation run (spec §6 "Status code mapping").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub assignments_written: u32,
    pub unassigned_slots: u32,
    pub elapsed_ms: u64,
    pub iterations: u64,
}

/// Night-float-to-post-call audit summary, named explicitly in spec §6.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NfPostCallAudit {
    pub violations_found: u32,
    pub affected_person_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub stats: RunStats,
    pub validation: ValidationSummary,
    pub nf_pc_audit: NfPostCallAudit,
    pub override_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub violations: Vec<Violation>,
    pub coverage_rate: f64,
}

/// `{start_date, end_date}` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ValidationRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationStatistics {
    pub tier1_count: u32,
    pub tier2_count: u32,
    pub tier3_count: u32,
    pub total_penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub total_violations: u32,
    pub violations: Vec<Violation>,
    pub coverage_rate: f64,
    pub statistics: ValidationStatistics,
}

/// `{swap_type, source_person_id, source_week, target_person_id?,
/// target_week?, reason}` (spec §6, §4.D).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SwapRequest {
    pub swap_type: SwapType,
    pub source_person_id: Uuid,
    pub source_week: NaiveDate,
    pub target_person_id: Option<Uuid>,
    pub target_week: Option<NaiveDate>,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    pub requested_by: Uuid,
}

/// Swap decision (spec §4.D "Decision").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwapDecision {
    Reject,
    Flag,
    Proceed,
}

/// Who a Flag decision routes to (spec §4.D "Approval routing").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    Coordinator,
    ProgramDirector,
    Architect,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierCheckOutcome {
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResponse {
    pub swap_id: Uuid,
    pub decision: SwapDecision,
    pub tier1: TierCheckOutcome,
    pub tier2: TierCheckOutcome,
    pub tier3: TierCheckOutcome,
    pub warnings: Vec<String>,
    pub escalation_level: Option<EscalationLevel>,
}

/// `{swap_id, reason}` (spec §6, §4.D "Rollback window").
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RollbackRequest {
    pub swap_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    pub requested_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResponse {
    pub success: bool,
    pub rolled_back_at: Option<DateTime<Utc>>,
    /// Populated only when `success == false`, e.g. `"WindowExpired"`
    /// (spec §8 scenario 5).
    pub reason: Option<String>,
}

/// `{start_date, end_date, subset?}` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResilienceQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub subset: Option<Vec<Uuid>>,
}

/// N-1 classification per spec §4.E.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImpactClass {
    Critical,
    HighImpact,
    LowImpact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonImpact {
    pub person_id: Uuid,
    pub classification: ImpactClass,
    pub rotations_at_risk: Vec<String>,
    pub understaffing_hours: f64,
    pub reassignment_candidates: Vec<Uuid>,
    pub induced_violations: Vec<Violation>,
    pub recovery_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FatalPair {
    pub person_a: Uuid,
    pub person_b: Uuid,
    pub rotations_at_risk: Vec<String>,
}

/// Utilization classification (spec §4.E "Utilization").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UtilizationClass {
    Green,
    Yellow,
    Orange,
    Red,
    Black,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationReport {
    pub rate: f64,
    pub class: UtilizationClass,
    pub wait_time_multiplier: f64,
}

/// Defense-in-depth level (spec §4.E "Defense-in-depth level").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DefenseInDepthLevel {
    Prevention,
    Control,
    SafetySystems,
    Containment,
    Emergency,
}

impl DefenseInDepthLevel {
    /// Only the top two levels grant the generator permission to relax
    /// Tier-2 constraints without operator input (spec §4.E).
    pub fn allows_tier2_relaxation(&self) -> bool {
        matches!(
            self,
            DefenseInDepthLevel::Containment | DefenseInDepthLevel::Emergency
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceResponse {
    pub per_person: Vec<PersonImpact>,
    pub fatal_pairs: Vec<FatalPair>,
    pub utilization: UtilizationReport,
    pub defense_in_depth_level: DefenseInDepthLevel,
    pub recommended_actions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_algorithm_is_hybrid() {
        assert_eq!(Algorithm::default(), Algorithm::Hybrid);
    }

    #[test]
    fn defense_in_depth_relaxation_is_top_two_only() {
        assert!(!DefenseInDepthLevel::Prevention.allows_tier2_relaxation());
        assert!(!DefenseInDepthLevel::SafetySystems.allows_tier2_relaxation());
        assert!(DefenseInDepthLevel::Containment.allows_tier2_relaxation());
        assert!(DefenseInDepthLevel::Emergency.allows_tier2_relaxation());
    }

    #[test]
    fn generation_request_rejects_timeout_out_of_range() {
        let request = GenerationRequest {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            algorithm: Algorithm::Hybrid,
            timeout_seconds: 1,
            pgy_levels: None,
            rotation_ids: None,
            idempotency_key: None,
            moonlighting: vec![],
        };
        assert!(request.validate().is_err());
    }
}
