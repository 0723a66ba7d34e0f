//! Phases 1-3 of the swap pipeline: structural validation, mutation
//! planning, and the three-tier safety check (spec §4.D).

use chrono::{Duration, NaiveDate, Utc, Weekday};
use uuid::Uuid;

use residency_constraints::ScheduleView;
use residency_domain::{
    Assignment, CallAssignment, CoreError, EscalationLevel, EvaluationResult, SwapDecision, SwapRequest, SwapType,
    Tier, TierCheckOutcome,
};
use residency_storage::{AssignmentMutation, PersonRepository};

/// Every mutation and bookkeeping fact a swap's commit phase needs, derived
/// once so `submit` and `approve_and_execute` plan identically.
pub struct MutationPlan {
    pub mutations: Vec<AssignmentMutation>,
    pub affected_person_ids: Vec<Uuid>,
    pub assignment_snapshot: Vec<(Uuid, Uuid)>,
    pub call_snapshot: Vec<(Uuid, Uuid)>,
}

/// Source/target exist and are active; weeks are Mondays, not in the past,
/// and (for `OneToOne`) distinct; the source actually holds assignments in
/// the source week (spec §4.D phase 1).
pub async fn structural_validate(people: &PersonRepository, request: &SwapRequest) -> Result<(), CoreError> {
    if request.source_week.weekday() != Weekday::Mon {
        return Err(CoreError::invariant("source_week must be a Monday"));
    }
    let today = Utc::now().date_naive();
    if request.source_week < today {
        return Err(CoreError::invariant("source_week is in the past"));
    }

    let source = people.get_by_id(request.source_person_id).await.map_err(CoreError::from)?;
    if !source.is_active() {
        return Err(CoreError::invariant("source person is not active"));
    }

    match request.swap_type {
        SwapType::OneToOne => {
            let target_id = request
                .target_person_id
                .ok_or_else(|| CoreError::invariant("OneToOne swap requires target_person_id"))?;
            let target_week = request
                .target_week
                .ok_or_else(|| CoreError::invariant("OneToOne swap requires target_week"))?;
            if target_week.weekday() != Weekday::Mon {
                return Err(CoreError::invariant("target_week must be a Monday"));
            }
            if target_week < today {
                return Err(CoreError::invariant("target_week is in the past"));
            }
            if target_week == request.source_week && target_id == request.source_person_id {
                return Err(CoreError::invariant("source and target weeks must differ"));
            }
            let target = people.get_by_id(target_id).await.map_err(CoreError::from)?;
            if !target.is_active() {
                return Err(CoreError::invariant("target person is not active"));
            }
        }
        SwapType::Absorb => {
            let target_id = request
                .target_person_id
                .ok_or_else(|| CoreError::invariant("Absorb swap requires target_person_id"))?;
            let target = people.get_by_id(target_id).await.map_err(CoreError::from)?;
            if !target.is_active() {
                return Err(CoreError::invariant("target person is not active"));
            }
        }
    }

    Ok(())
}

fn week_range(week_start: NaiveDate) -> (NaiveDate, NaiveDate) {
    (week_start, week_start + Duration::days(6))
}

/// Builds the mutation plan for `request` against the loaded `view`. Fails
/// with `Invariant` if the source holds no assignments in the source week
/// (spec §4.D phase 1 "source actually holds the source-week assignments
/// being swapped").
pub fn plan_mutations(view: &ScheduleView, request: &SwapRequest) -> Result<MutationPlan, CoreError> {
    let (source_start, source_end) = week_range(request.source_week);
    let source_assignments: Vec<&Assignment> = view
        .assignments_for(request.source_person_id)
        .filter(|a| view.blocks.get(&a.block_id).is_some_and(|b| b.date >= source_start && b.date <= source_end))
        .collect();
    let source_calls: Vec<&CallAssignment> = view
        .call_assignments_for(request.source_person_id)
        .filter(|c| c.date >= source_start && c.date <= source_end)
        .collect();

    if source_assignments.is_empty() && source_calls.is_empty() {
        return Err(CoreError::invariant_with(
            "source person holds no assignments in the source week",
            serde_json::json!({ "person_id": request.source_person_id, "week": request.source_week }),
        ));
    }

    let mut mutations = Vec::new();
    let mut assignment_snapshot = Vec::new();
    let mut call_snapshot = Vec::new();
    let mut affected_person_ids = vec![request.source_person_id];

    match request.swap_type {
        SwapType::OneToOne => {
            let target_id = request.target_person_id.expect("validated by structural_validate");
            let target_week = request.target_week.expect("validated by structural_validate");
            let (target_start, target_end) = week_range(target_week);
            let target_assignments: Vec<&Assignment> = view
                .assignments_for(target_id)
                .filter(|a| view.blocks.get(&a.block_id).is_some_and(|b| b.date >= target_start && b.date <= target_end))
                .collect();
            let target_calls: Vec<&CallAssignment> = view
                .call_assignments_for(target_id)
                .filter(|c| c.date >= target_start && c.date <= target_end)
                .collect();

            for a in &source_assignments {
                mutations.push(upsert_assignment(a, target_id));
                assignment_snapshot.push((a.id, request.source_person_id));
            }
            for a in &target_assignments {
                mutations.push(upsert_assignment(a, request.source_person_id));
                assignment_snapshot.push((a.id, target_id));
            }
            for c in &source_calls {
                mutations.push(upsert_call(c, target_id));
                call_snapshot.push((c.id, request.source_person_id));
            }
            for c in &target_calls {
                mutations.push(upsert_call(c, request.source_person_id));
                call_snapshot.push((c.id, target_id));
            }
            affected_person_ids.push(target_id);
        }
        SwapType::Absorb => {
            let target_id = request.target_person_id.expect("validated by structural_validate");
            for a in &source_assignments {
                mutations.push(upsert_assignment(a, target_id));
                assignment_snapshot.push((a.id, request.source_person_id));
            }
            for c in &source_calls {
                mutations.push(upsert_call(c, target_id));
                call_snapshot.push((c.id, request.source_person_id));
            }
            affected_person_ids.push(target_id);
        }
    }

    Ok(MutationPlan {
        mutations,
        affected_person_ids,
        assignment_snapshot,
        call_snapshot,
    })
}

fn upsert_assignment(source: &Assignment, new_person_id: Uuid) -> AssignmentMutation {
    AssignmentMutation::UpsertAssignment {
        id: source.id,
        block_id: source.block_id,
        person_id: new_person_id,
        rotation_id: source.rotation_id,
        notes: source.notes.clone(),
    }
}

fn upsert_call(source: &CallAssignment, new_person_id: Uuid) -> AssignmentMutation {
    AssignmentMutation::UpsertCallAssignment {
        id: source.id,
        date: source.date,
        call_type: source.call_type,
        person_id: new_person_id,
        is_weekend: source.is_weekend,
        is_holiday: source.is_holiday,
    }
}

/// Applies `mutations` onto a clone of `view` so the safety check runs
/// against the schedule the commit would actually produce (spec §4.D phase
/// 2 "as if the swap were committed"), mirroring the generator's own
/// commit-after-projected-validation discipline.
pub fn project(view: &ScheduleView, mutations: &[AssignmentMutation]) -> ScheduleView {
    let mut projected = view.clone();
    for mutation in mutations {
        match mutation {
            AssignmentMutation::UpsertAssignment { id, block_id, person_id, rotation_id, notes } => {
                projected.assignments.retain(|a| a.id != *id);
                projected.assignments.push(Assignment {
                    id: *id,
                    block_id: *block_id,
                    person_id: *person_id,
                    rotation_id: *rotation_id,
                    notes: notes.clone(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                });
            }
            AssignmentMutation::DeleteAssignment { id } => {
                projected.assignments.retain(|a| a.id != *id);
            }
            AssignmentMutation::UpsertCallAssignment { id, date, call_type, person_id, is_weekend, is_holiday } => {
                projected.call_assignments.retain(|c| c.id != *id);
                projected.call_assignments.push(CallAssignment {
                    id: *id,
                    date: *date,
                    person_id: *person_id,
                    call_type: *call_type,
                    is_weekend: *is_weekend,
                    is_holiday: *is_holiday,
                });
            }
            AssignmentMutation::DeleteCallAssignment { date, call_type } => {
                projected.call_assignments.retain(|c| !(c.date == *date && c.call_type == *call_type));
            }
        }
    }
    projected
}

/// Everything phase 2/3 produced, ready to become a `SwapResponse` (spec
/// §4.D phases 2-3).
pub struct DecisionOutcome {
    pub decision: SwapDecision,
    pub tier1: TierCheckOutcome,
    pub tier2: TierCheckOutcome,
    pub tier3: TierCheckOutcome,
    pub warnings: Vec<String>,
    pub escalation_level: Option<EscalationLevel>,
}

/// Tier 1 violations reject outright; Tier 2 violations flag for human
/// approval; Tier 3 (soft) violations become warnings only (spec §4.D
/// phase 2-3). The utilization-delta/N-1-margin half of the Tier-3 check
/// is delegated to the resilience evaluator by the caller, not computed
/// here — see `resilience_escalates` in `SwapEngine::submit`.
pub fn decide(evaluation: &EvaluationResult, mutation_count: usize, reason: &str, swap_type: SwapType) -> DecisionOutcome {
    let tier1 = TierCheckOutcome {
        violations: evaluation.violations.iter().filter(|v| v.tier == Tier::Absolute).cloned().collect(),
    };
    let tier2 = TierCheckOutcome {
        violations: evaluation.violations.iter().filter(|v| v.tier == Tier::Institutional).cloned().collect(),
    };
    let tier3 = TierCheckOutcome {
        violations: evaluation.violations.iter().filter(|v| v.tier == Tier::Optimization).cloned().collect(),
    };
    let warnings = tier3.violations.iter().map(|v| v.message.clone()).collect();

    let decision = if !tier1.violations.is_empty() {
        SwapDecision::Reject
    } else if !tier2.violations.is_empty() {
        SwapDecision::Flag
    } else {
        SwapDecision::Proceed
    };

    let escalation_level = if decision == SwapDecision::Flag {
        Some(escalation_for(&tier2, mutation_count, reason, swap_type))
    } else {
        None
    };

    DecisionOutcome { decision, tier1, tier2, tier3, warnings, escalation_level }
}

/// Approval routing (spec §4.D "Approval routing"): Architect for a
/// large-blast-radius swap, Program Director for a sensitive reason or an
/// Absorb that leaves a coverage gap with no replacement, Coordinator
/// otherwise.
fn escalation_for(tier2: &TierCheckOutcome, mutation_count: usize, reason: &str, swap_type: SwapType) -> EscalationLevel {
    if mutation_count > 10 {
        return EscalationLevel::Architect;
    }
    let coverage_gap = tier2.violations.iter().any(|v| v.constraint_id == "TIER2_MINIMUM_COVERAGE");
    let sensitive = reason.to_lowercase().contains("sensitive");
    if sensitive || (coverage_gap && swap_type == SwapType::Absorb) {
        return EscalationLevel::ProgramDirector;
    }
    EscalationLevel::Coordinator
}

#[cfg(test)]
mod tests {
    use residency_domain::{AffectedEntities, ConstraintKind, Severity};

    use super::*;

    fn violation(tier: Tier, constraint_id: &str) -> residency_domain::Violation {
        residency_domain::Violation {
            constraint_id: constraint_id.to_string(),
            tier,
            kind: ConstraintKind::Hard,
            severity: Severity::Error,
            affected: AffectedEntities::default(),
            context: serde_json::json!({}),
            penalty: 0.0,
            message: "test violation".to_string(),
        }
    }

    #[test]
    fn tier1_violation_rejects_regardless_of_other_tiers() {
        let evaluation = EvaluationResult {
            violations: vec![violation(Tier::Absolute, "TIER1_X"), violation(Tier::Institutional, "TIER2_Y")],
            ..Default::default()
        };
        let outcome = decide(&evaluation, 1, "routine", SwapType::OneToOne);
        assert_eq!(outcome.decision, SwapDecision::Reject);
    }

    #[test]
    fn tier2_violation_flags_and_routes_to_coordinator_by_default() {
        let evaluation = EvaluationResult { violations: vec![violation(Tier::Institutional, "TIER2_Y")], ..Default::default() };
        let outcome = decide(&evaluation, 1, "routine", SwapType::OneToOne);
        assert_eq!(outcome.decision, SwapDecision::Flag);
        assert_eq!(outcome.escalation_level, Some(EscalationLevel::Coordinator));
    }

    #[test]
    fn large_blast_radius_escalates_to_architect() {
        let evaluation = EvaluationResult { violations: vec![violation(Tier::Institutional, "TIER2_Y")], ..Default::default() };
        let outcome = decide(&evaluation, 11, "routine", SwapType::OneToOne);
        assert_eq!(outcome.escalation_level, Some(EscalationLevel::Architect));
    }

    #[test]
    fn coverage_gap_on_absorb_escalates_to_program_director() {
        let evaluation = EvaluationResult {
            violations: vec![violation(Tier::Institutional, "TIER2_MINIMUM_COVERAGE")],
            ..Default::default()
        };
        let outcome = decide(&evaluation, 1, "routine", SwapType::Absorb);
        assert_eq!(outcome.escalation_level, Some(EscalationLevel::ProgramDirector));
    }

    #[test]
    fn tier3_only_proceeds_with_warnings() {
        let evaluation = EvaluationResult { violations: vec![violation(Tier::Optimization, "TIER3_Z")], ..Default::default() };
        let outcome = decide(&evaluation, 1, "routine", SwapType::OneToOne);
        assert_eq!(outcome.decision, SwapDecision::Proceed);
        assert_eq!(outcome.warnings.len(), 1);
    }
}
