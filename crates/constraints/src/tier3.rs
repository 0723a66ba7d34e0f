//! Tier 3 (Optimization) constraints: soft, penalty-only signals that feed
//! the weighted objective `α·Gini(hours) + β·Gini(calls) + γ·handoffs +
//! δ·fragmentation + ε·preference_deficit + ζ·utilization_overshoot`
//! (spec §4.B, §4.C).

use serde_json::json;

use residency_domain::{AbsenceKind, AffectedEntities, ConstraintKind, Session, Severity, Tier, Violation};

use crate::{Constraint, EvaluationContext, ScheduleView};

fn session_ordinal(session: Session) -> u8 {
    match session {
        Session::Am => 0,
        Session::Pm => 1,
    }
}

pub fn catalog() -> Vec<Box<dyn Constraint>> {
    vec![
        Box::new(WorkloadEquityRule),
        Box::new(CallEquityRule),
        Box::new(PreferenceRule),
        Box::new(FragmentationRule),
        Box::new(UtilizationOvershootRule),
    ]
}

fn soft_violation(
    constraint_id: &str,
    affected: AffectedEntities,
    context: serde_json::Value,
    penalty: f64,
    message: String,
) -> Violation {
    Violation {
        constraint_id: constraint_id.to_string(),
        tier: Tier::Optimization,
        kind: ConstraintKind::Soft,
        severity: Severity::Info,
        affected,
        context,
        penalty,
        message,
    }
}

/// Gini coefficient of a non-negative distribution; 0 is perfectly equal.
fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let sum: f64 = sorted.iter().sum();
    if sum == 0.0 {
        return 0.0;
    }
    let weighted: f64 = sorted.iter().enumerate().map(|(i, v)| (i as f64 + 1.0) * v).sum();
    (2.0 * weighted) / (n as f64 * sum) - (n as f64 + 1.0) / n as f64
}

/// Penalizes inequality in accumulated duty hours across residents
/// (spec §4.B Tier-3 "workload equity"; target from `EquityTargets`).
pub struct WorkloadEquityRule;

impl Constraint for WorkloadEquityRule {
    fn id(&self) -> &'static str {
        "TIER3_WORKLOAD_EQUITY"
    }

    fn evaluate(&self, view: &ScheduleView, ctx: &EvaluationContext) -> Vec<Violation> {
        let residents: Vec<_> = view.people.values().filter(|p| p.is_active() && p.role.is_resident()).collect();
        if residents.len() < 2 {
            return Vec::new();
        }

        let hours: Vec<f64> = residents
            .iter()
            .map(|p| view.duty_hours_in_window(p.id, view.range_start, &ctx.config.rotation_hour_weights))
            .collect();
        let coefficient = gini(&hours);
        let target = ctx.config.equity_targets.workload_gini;
        if coefficient <= target {
            return Vec::new();
        }

        let overshoot = coefficient - target;
        vec![soft_violation(
            self.id(),
            AffectedEntities {
                person_ids: residents.iter().map(|p| p.id).collect(),
                block_ids: vec![],
                rotation_ids: vec![],
            },
            json!({ "gini": coefficient, "target": target }),
            ctx.config.objective_weights.hours_equity * overshoot,
            format!("workload Gini {coefficient:.3} exceeds target {target:.3}"),
        )]
    }
}

/// Penalizes inequality in call burden (sunday + weekday + FMIT-week
/// counts), the second half of the equity objective.
pub struct CallEquityRule;

impl Constraint for CallEquityRule {
    fn id(&self) -> &'static str {
        "TIER3_CALL_EQUITY"
    }

    fn evaluate(&self, view: &ScheduleView, ctx: &EvaluationContext) -> Vec<Violation> {
        let residents: Vec<_> = view.people.values().filter(|p| p.is_active() && p.role.is_resident()).collect();
        if residents.len() < 2 {
            return Vec::new();
        }

        let loads: Vec<f64> = residents
            .iter()
            .map(|p| {
                (p.counters.sunday_call_count + p.counters.weekday_call_count + p.counters.fmit_week_count) as f64
            })
            .collect();
        let coefficient = gini(&loads);
        let target = ctx.config.equity_targets.call_gini;
        if coefficient <= target {
            return Vec::new();
        }

        let overshoot = coefficient - target;
        vec![soft_violation(
            self.id(),
            AffectedEntities {
                person_ids: residents.iter().map(|p| p.id).collect(),
                block_ids: vec![],
                rotation_ids: vec![],
            },
            json!({ "gini": coefficient, "target": target }),
            ctx.config.objective_weights.call_equity * overshoot,
            format!("call Gini {coefficient:.3} exceeds target {target:.3}"),
        )]
    }
}

/// Non-blocking, non-`HardPreference` absences (soft preferences such as a
/// requested day off) that a proposed schedule still overlaps.
pub struct PreferenceRule;

impl Constraint for PreferenceRule {
    fn id(&self) -> &'static str {
        "TIER3_PREFERENCE_DEFICIT"
    }

    fn evaluate(&self, view: &ScheduleView, ctx: &EvaluationContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for assignment in &view.assignments {
            let Some(block) = view.blocks.get(&assignment.block_id) else { continue };
            let deficit = view.absences.iter().any(|absence| {
                absence.person_id == assignment.person_id
                    && !absence.blocking
                    && absence.kind != AbsenceKind::HardPreference
                    && absence.covers(block.date)
            });
            if deficit {
                violations.push(soft_violation(
                    self.id(),
                    AffectedEntities::person_and_block(assignment.person_id, block.id),
                    json!({ "date": block.date }),
                    ctx.config.objective_weights.preference,
                    "assignment overlaps a soft scheduling preference".to_string(),
                ));
            }
        }
        violations
    }
}

/// Counts rotation handoffs per resident as a proxy for continuity loss
/// and schedule fragmentation (spec §4.B Tier-3 "continuity" and
/// "efficiency/fragmentation" signals, folded into one pass since both
/// derive from the same adjacency scan).
pub struct FragmentationRule;

impl Constraint for FragmentationRule {
    fn id(&self) -> &'static str {
        "TIER3_FRAGMENTATION"
    }

    fn evaluate(&self, view: &ScheduleView, ctx: &EvaluationContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for person in view.people.values().filter(|p| p.is_active()) {
            let mut entries: Vec<_> = view
                .assignments_for(person.id)
                .filter_map(|a| view.blocks.get(&a.block_id).map(|b| (b.date, session_ordinal(b.session), a.rotation_id)))
                .collect();
            entries.sort_by_key(|(date, ordinal, _)| (*date, *ordinal));

            let mut handoffs = 0u32;
            for pair in entries.windows(2) {
                if pair[0].2 != pair[1].2 {
                    handoffs += 1;
                }
            }
            if handoffs == 0 {
                continue;
            }

            let penalty = ctx.config.objective_weights.continuity * handoffs as f64
                + ctx.config.objective_weights.fragmentation * handoffs as f64;
            violations.push(soft_violation(
                self.id(),
                AffectedEntities::person(person.id),
                json!({ "handoffs": handoffs }),
                penalty,
                format!("{} has {} rotation handoffs in range", person.display_name, handoffs),
            ));
        }
        violations
    }
}

/// Penalizes a person whose scheduled duty hours push them past the
/// Yellow utilization threshold, ahead of the resilience module's own
/// hard classification (spec §4.E; shared thresholds from
/// `EngineConfig::utilization_thresholds`).
pub struct UtilizationOvershootRule;

impl Constraint for UtilizationOvershootRule {
    fn id(&self) -> &'static str {
        "TIER3_UTILIZATION_OVERSHOOT"
    }

    fn evaluate(&self, view: &ScheduleView, ctx: &EvaluationContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        const MAX_WEEKLY_HOURS: f64 = 80.0;
        for person in view.people.values().filter(|p| p.is_active()) {
            let hours = view.duty_hours_in_window(person.id, view.range_start, &ctx.config.rotation_hour_weights);
            let utilization = hours / (MAX_WEEKLY_HOURS * 4.0);
            let threshold = ctx.config.utilization_thresholds.yellow;
            if utilization <= threshold {
                continue;
            }
            let overshoot = utilization - threshold;
            violations.push(soft_violation(
                self.id(),
                AffectedEntities::person(person.id),
                json!({ "utilization": utilization, "threshold": threshold }),
                ctx.config.objective_weights.utilization_overshoot * overshoot,
                format!("{} is at {:.1}% utilization, above the {:.0}% target", person.display_name, utilization * 100.0, threshold * 100.0),
            ));
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gini_of_equal_distribution_is_zero() {
        assert!((gini(&[10.0, 10.0, 10.0]) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn gini_of_skewed_distribution_is_positive() {
        assert!(gini(&[0.0, 0.0, 100.0]) > 0.0);
    }

    #[test]
    fn gini_of_empty_is_zero() {
        assert_eq!(gini(&[]), 0.0);
    }
}
