//! N-1 and N-2 simulation (spec §4.E): what a person's (or a pair's) full
//! unavailability would do to coverage, with no rescheduling attempted.

use std::collections::HashMap;
use std::sync::Arc;

use residency_config::EngineConfig;
use residency_constraints::{EvaluationContext, ScheduleView};
use residency_domain::{FatalPair, ImpactClass, PersonImpact, Scope};
use uuid::Uuid;

struct Shortfall {
    rotation_name: String,
    hours: f64,
    date: chrono::NaiveDate,
}

/// Coverage shortfalls created in the blocks `person_id` was assigned to,
/// computed against `view` as it stands (i.e. before removing anyone) —
/// the caller passes a view with `person_id` already removed so "after"
/// counts reflect the disruption.
fn shortfalls_for_removed_blocks(
    view: &ScheduleView,
    removed_block_rotation: &[(Uuid, Uuid, chrono::NaiveDate)],
    rotation_hour_weights: &HashMap<String, f64>,
) -> Vec<Shortfall> {
    let mut counts: HashMap<(Uuid, Uuid), u32> = HashMap::new();
    for assignment in &view.assignments {
        *counts.entry((assignment.block_id, assignment.rotation_id)).or_insert(0) += 1;
    }

    let mut out = Vec::new();
    for (block_id, rotation_id, date) in removed_block_rotation {
        let Some(rotation) = view.rotations.get(rotation_id) else { continue };
        let count = counts.get(&(*block_id, *rotation_id)).copied().unwrap_or(0);
        if count < rotation.min_coverage {
            let weight = rotation_hour_weights.get(rotation.category.config_key()).copied().unwrap_or(8.0) / 2.0;
            out.push(Shortfall {
                rotation_name: rotation.name.clone(),
                hours: (rotation.min_coverage - count) as f64 * weight,
                date: *date,
            });
        }
    }
    out
}

/// Candidates who could plausibly absorb one of `person_id`'s blocks:
/// active, qualified for the rotation, and not already assigned that
/// block.
fn reassignment_candidates(view: &ScheduleView, person_id: Uuid, block_ids: &[Uuid], rotation_ids: &[Uuid]) -> Vec<Uuid> {
    let mut candidates = Vec::new();
    for person in view.people.values().filter(|p| p.is_active() && p.id != person_id) {
        let certs = view.certifications_for(person.id);
        let clearance = view.has_clearance(person.id);
        let qualifies = rotation_ids.iter().any(|rotation_id| {
            view.rotations
                .get(rotation_id)
                .is_some_and(|r| r.is_satisfied_by(person.pgy_level(), certs, clearance))
        });
        let already_assigned = block_ids.iter().any(|block_id| {
            view.assignments_for_block(*block_id).any(|a| a.person_id == person.id)
        });
        if qualifies && !already_assigned {
            candidates.push(person.id);
        }
    }
    candidates
}

/// Whether `person_id`'s full unavailability would drop any `(block,
/// rotation)` they hold below its minimum coverage — the pure, I/O-free
/// core of the N-1 check, reusable by a caller (the swap engine's
/// resilience gate) that already has an in-memory `view` and no store
/// access (spec §4.D "Tier 3: resilience delta ... N-1 margin dropping to
/// zero").
pub fn introduces_zero_margin(view: &ScheduleView, person_id: Uuid) -> bool {
    let held: Vec<(Uuid, Uuid, chrono::NaiveDate)> = view
        .assignments_for(person_id)
        .filter_map(|a| view.blocks.get(&a.block_id).map(|b| (a.block_id, a.rotation_id, b.date)))
        .collect();
    if held.is_empty() {
        return false;
    }

    let mut projected = view.clone();
    projected.assignments.retain(|a| a.person_id != person_id);
    !shortfalls_for_removed_blocks(&projected, &held, &HashMap::new()).is_empty()
}

fn classify(shortfalls: &[Shortfall], weekly_hours: f64) -> (ImpactClass, u32) {
    if !shortfalls.is_empty() {
        let mut dates: Vec<_> = shortfalls.iter().map(|s| s.date).collect();
        dates.sort();
        dates.dedup();
        return (ImpactClass::Critical, dates.len() as u32);
    }
    if weekly_hours >= 10.0 {
        (ImpactClass::HighImpact, 1)
    } else {
        (ImpactClass::LowImpact, 0)
    }
}

fn impact_for_person(view: &ScheduleView, person_id: Uuid, config: &EngineConfig) -> PersonImpact {
    let held: Vec<(Uuid, Uuid, chrono::NaiveDate)> = view
        .assignments_for(person_id)
        .filter_map(|a| view.blocks.get(&a.block_id).map(|b| (a.block_id, a.rotation_id, b.date)))
        .collect();
    let block_ids: Vec<Uuid> = held.iter().map(|(b, _, _)| *b).collect();
    let rotation_ids: Vec<Uuid> = {
        let mut r: Vec<Uuid> = held.iter().map(|(_, r, _)| *r).collect();
        r.sort();
        r.dedup();
        r
    };

    let mut projected = view.clone();
    projected.assignments.retain(|a| a.person_id != person_id);
    projected.call_assignments.retain(|c| c.person_id != person_id);

    let shortfalls = shortfalls_for_removed_blocks(&projected, &held, &config.rotation_hour_weights);

    let has_missing_call = view
        .call_assignments_for(person_id)
        .any(|c| !projected.call_assignments.iter().any(|p| p.date == c.date && p.call_type == c.call_type));

    let window_start = view.range_start;
    let weekly_hours = {
        let days = (view.range_end - view.range_start).num_days().max(1) as f64 + 1.0;
        let total = view.duty_hours_in_window(person_id, window_start, &config.rotation_hour_weights);
        total / (days / 7.0).max(1.0)
    };

    let (classification, recovery_days) = classify(&shortfalls, weekly_hours);

    let ctx = EvaluationContext { config };
    let evaluation = residency_constraints::evaluate(&projected, Scope::Global, &ctx);
    let induced_violations = evaluation
        .violations
        .into_iter()
        .filter(|v| v.affected.block_ids.iter().any(|b| block_ids.contains(b)))
        .collect();

    let rotations_at_risk = shortfalls.iter().map(|s| s.rotation_name.clone()).collect::<Vec<_>>();
    let understaffing_hours = shortfalls.iter().map(|s| s.hours).sum::<f64>()
        + if has_missing_call { config.rotation_hour_weights.get("Call").copied().unwrap_or(14.0) } else { 0.0 };

    PersonImpact {
        person_id,
        classification,
        rotations_at_risk,
        understaffing_hours,
        reassignment_candidates: reassignment_candidates(view, person_id, &block_ids, &rotation_ids),
        induced_violations,
        recovery_days,
    }
}

/// Runs one N-1 simulation per person in `subset`, fanned out across a
/// bounded worker pool (spec §5.1) since each simulation is independent,
/// read-only work over a shared view.
pub async fn simulate_n1(view: Arc<ScheduleView>, subset: Vec<Uuid>, config: Arc<EngineConfig>) -> Vec<PersonImpact> {
    let mut tasks = tokio::task::JoinSet::new();
    for person_id in subset {
        let view = Arc::clone(&view);
        let config = Arc::clone(&config);
        tasks.spawn(async move { impact_for_person(&view, person_id, &config) });
    }

    let mut impacts = Vec::new();
    while let Some(result) = tasks.join_next().await {
        if let Ok(impact) = result {
            impacts.push(impact);
        }
    }
    impacts
}

/// Fatal pairs: two people sharing a `(block, rotation)` where coverage is
/// exactly `min_coverage + 1` — the one spare slot either alone could give
/// up, but not both (spec §4.E "coverage failure not present in either
/// N-1 case"). Restricting to shared blocks keeps this tractable; a joint
/// absence can only create a failure neither N-1 case shows in a block
/// both people actually held.
pub fn simulate_n2(view: &ScheduleView, subset: &[Uuid]) -> Vec<FatalPair> {
    let subset_set: std::collections::HashSet<Uuid> = subset.iter().copied().collect();
    let mut groups: HashMap<(Uuid, Uuid), Vec<Uuid>> = HashMap::new();
    for assignment in &view.assignments {
        if !subset_set.contains(&assignment.person_id) {
            continue;
        }
        groups.entry((assignment.block_id, assignment.rotation_id)).or_default().push(assignment.person_id);
    }

    let mut pairs: HashMap<(Uuid, Uuid), Vec<String>> = HashMap::new();
    for ((block_id, rotation_id), people) in groups {
        let Some(rotation) = view.rotations.get(&rotation_id) else { continue };
        if people.len() as u32 != rotation.min_coverage + 1 {
            continue;
        }
        let _ = block_id;
        for i in 0..people.len() {
            for j in (i + 1)..people.len() {
                let key = if people[i] < people[j] { (people[i], people[j]) } else { (people[j], people[i]) };
                pairs.entry(key).or_default().push(rotation.name.clone());
            }
        }
    }

    pairs
        .into_iter()
        .map(|((person_a, person_b), mut rotations_at_risk)| {
            rotations_at_risk.sort();
            rotations_at_risk.dedup();
            FatalPair { person_a, person_b, rotations_at_risk }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use residency_domain::{
        Assignment, Block, CallEquityCounters, Person, PersonRole, PersonStatus, RequiredQualifications,
        RotationCategory, RotationTemplate, Session,
    };

    use super::*;

    fn fixed_now() -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn resident(pgy: u8) -> Person {
        Person {
            id: Uuid::new_v4(),
            display_name: "Test Resident".to_string(),
            role: PersonRole::Resident { pgy_level: pgy },
            email: "resident@example.org".to_string(),
            counters: CallEquityCounters::default(),
            status: PersonStatus::Active,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    fn block(date: NaiveDate) -> Block {
        Block { id: Uuid::new_v4(), date, session: Session::Am, sequence_number: 1, is_weekend: false, is_holiday: false, holiday_name: None }
    }

    fn rotation(min_coverage: u32) -> RotationTemplate {
        RotationTemplate {
            id: Uuid::new_v4(),
            name: "ICU".to_string(),
            category: RotationCategory::Inpatient,
            required_qualifications: RequiredQualifications::default(),
            min_coverage,
            max_coverage: min_coverage + 2,
        }
    }

    fn assignment(block_id: Uuid, person_id: Uuid, rotation_id: Uuid) -> Assignment {
        Assignment { id: Uuid::new_v4(), block_id, person_id, rotation_id, notes: None, created_at: fixed_now(), updated_at: fixed_now() }
    }

    fn view_with(people: Vec<Person>, blocks: Vec<Block>, rotations: Vec<RotationTemplate>, assignments: Vec<Assignment>) -> ScheduleView {
        let mut view = ScheduleView {
            range_start: blocks.first().map(|b| b.date).unwrap_or_default(),
            range_end: blocks.last().map(|b| b.date).unwrap_or_default(),
            ..Default::default()
        };
        view.people = people.into_iter().map(|p| (p.id, p)).collect();
        view.blocks = blocks.into_iter().map(|b| (b.id, b)).collect();
        view.rotations = rotations.into_iter().map(|r| (r.id, r)).collect();
        view.assignments = assignments;
        view
    }

    #[test]
    fn solo_coverage_at_minimum_introduces_zero_margin() {
        let person = resident(2);
        let b = block(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let r = rotation(1);
        let view = view_with(vec![person.clone()], vec![b.clone()], vec![r.clone()], vec![assignment(b.id, person.id, r.id)]);
        assert!(introduces_zero_margin(&view, person.id));
    }

    #[test]
    fn double_coverage_with_spare_does_not_introduce_zero_margin() {
        let a = resident(2);
        let c = resident(3);
        let b = block(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let r = rotation(1);
        let view = view_with(
            vec![a.clone(), c.clone()],
            vec![b.clone()],
            vec![r.clone()],
            vec![assignment(b.id, a.id, r.id), assignment(b.id, c.id, r.id)],
        );
        assert!(!introduces_zero_margin(&view, a.id));
    }

    #[test]
    fn pair_at_min_coverage_plus_one_is_fatal() {
        let a = resident(2);
        let c = resident(3);
        let b = block(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let r = rotation(1);
        let view = view_with(
            vec![a.clone(), c.clone()],
            vec![b.clone()],
            vec![r.clone()],
            vec![assignment(b.id, a.id, r.id), assignment(b.id, c.id, r.id)],
        );
        let pairs = simulate_n2(&view, &[a.id, c.id]);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn triple_coverage_with_two_spares_has_no_fatal_pair() {
        let a = resident(2);
        let c = resident(3);
        let d = resident(1);
        let b = block(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let r = rotation(1);
        let view = view_with(
            vec![a.clone(), c.clone(), d.clone()],
            vec![b.clone()],
            vec![r.clone()],
            vec![assignment(b.id, a.id, r.id), assignment(b.id, c.id, r.id), assignment(b.id, d.id, r.id)],
        );
        assert!(simulate_n2(&view, &[a.id, c.id, d.id]).is_empty());
    }
}
