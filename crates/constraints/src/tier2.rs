//! Tier 2 (Institutional) constraints: hard, but overridable by an
//! operator — the swap engine routes a Tier-2 violation to `Flag` rather
//! than an automatic `Reject` (spec §4.B, §4.D).

use chrono::{Datelike, Duration, NaiveDate};
use serde_json::json;

use residency_domain::{AbsenceKind, AffectedEntities, ConstraintKind, RotationCategory, Severity, Tier, Violation};

use crate::{Constraint, EvaluationContext, ScheduleView};

const FMIT_SEQUENCING_WINDOW_DAYS: i64 = 180;

/// `RotationCategory::Other("FMIT")` is how an FMIT rotation is encoded;
/// the glossary describes it as "an inpatient rotation category with
/// specific sequencing requirements for PGY-1s" rather than a distinct
/// top-level `RotationCategory` variant.
fn is_fmit(category: &RotationCategory) -> bool {
    category.config_key() == "FMIT"
}

pub fn catalog() -> Vec<Box<dyn Constraint>> {
    vec![
        Box::new(FmitSequencingRule),
        Box::new(NightFloatPostCallRule),
        Box::new(HardPreferenceBlockRule),
        Box::new(MinimumCoverageRule),
        Box::new(ContinuityClinicRule),
    ]
}

fn violation(constraint_id: &str, affected: AffectedEntities, context: serde_json::Value, message: String) -> Violation {
    Violation {
        constraint_id: constraint_id.to_string(),
        tier: Tier::Institutional,
        kind: ConstraintKind::Hard,
        severity: Severity::Warning,
        affected,
        context,
        penalty: 0.0,
        message,
    }
}

/// Flags a person assigned the calendar day immediately after their last
/// Night Float shift (no post-call rest day), or starting a fresh Night
/// Float stretch within 7 days of finishing a prior one.
pub struct NightFloatPostCallRule;

impl Constraint for NightFloatPostCallRule {
    fn id(&self) -> &'static str {
        "TIER2_NF_POST_CALL"
    }

    fn evaluate(&self, view: &ScheduleView, _ctx: &EvaluationContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for person in view.people.values().filter(|p| p.is_active()) {
            let mut nf_dates: Vec<_> = view
                .assignments_for(person.id)
                .filter_map(|a| {
                    let rotation = view.rotations.get(&a.rotation_id)?;
                    if rotation.category != RotationCategory::NightFloat {
                        return None;
                    }
                    view.blocks.get(&a.block_id).map(|b| b.date)
                })
                .collect();
            nf_dates.sort();
            nf_dates.dedup();

            if nf_dates.is_empty() {
                continue;
            }

            let mut stretch_ends = Vec::new();
            let mut stretch_start = nf_dates[0];
            let mut prev = nf_dates[0];
            for date in nf_dates.iter().skip(1) {
                if *date != prev + Duration::days(1) {
                    stretch_ends.push((stretch_start, prev));
                    stretch_start = *date;
                }
                prev = *date;
            }
            stretch_ends.push((stretch_start, prev));

            for (_, end) in &stretch_ends {
                let post_call_day = *end + Duration::days(1);
                let has_post_call_assignment = view
                    .assignments_for(person.id)
                    .filter_map(|a| view.blocks.get(&a.block_id))
                    .any(|b| b.date == post_call_day);
                if has_post_call_assignment {
                    violations.push(violation(
                        self.id(),
                        AffectedEntities::person(person.id),
                        json!({ "night_float_end": end, "post_call_day": post_call_day }),
                        format!("{} is assigned on the post-call day after Night Float", person.display_name),
                    ));
                }
            }

            for pair in stretch_ends.windows(2) {
                let (_, prev_end) = pair[0];
                let (next_start, _) = pair[1];
                if (next_start - prev_end).num_days() < 7 {
                    violations.push(violation(
                        self.id(),
                        AffectedEntities::person(person.id),
                        json!({ "previous_end": prev_end, "next_start": next_start, "min_gap_days": 7 }),
                        format!("{} starts a new Night Float stretch within 7 days of the last one", person.display_name),
                    ));
                }
            }
        }
        violations
    }
}

/// Every PGY-1 must complete at least one FMIT rotation within the first
/// 180 days of the academic year (spec §4.B Tier-2).
pub struct FmitSequencingRule;

impl Constraint for FmitSequencingRule {
    fn id(&self) -> &'static str {
        "TIER2_FMIT_SEQUENCING"
    }

    fn evaluate(&self, view: &ScheduleView, _ctx: &EvaluationContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        let deadline = view.range_start + Duration::days(FMIT_SEQUENCING_WINDOW_DAYS - 1);

        for person in view.people.values().filter(|p| p.is_active() && p.pgy_level() == Some(1)) {
            let completed_fmit = view.assignments_for(person.id).any(|a| {
                let Some(rotation) = view.rotations.get(&a.rotation_id) else { return false };
                if !is_fmit(&rotation.category) {
                    return false;
                }
                let Some(block) = view.blocks.get(&a.block_id) else { return false };
                block.date >= view.range_start && block.date <= deadline
            });

            if !completed_fmit {
                violations.push(violation(
                    self.id(),
                    AffectedEntities::person(person.id),
                    json!({ "academic_year_start": view.range_start, "deadline": deadline }),
                    format!(
                        "{} has not completed an FMIT rotation within {} days of the academic year start",
                        person.display_name, FMIT_SEQUENCING_WINDOW_DAYS
                    ),
                ));
            }
        }
        violations
    }
}

/// A non-blocking `HardPreference` absence that a generated/proposed
/// assignment nonetheless overlaps — distinguishable from the Tier-1
/// `DeploymentBlockingRule`, which only fires on `blocking == true`.
pub struct HardPreferenceBlockRule;

impl Constraint for HardPreferenceBlockRule {
    fn id(&self) -> &'static str {
        "TIER2_HARD_PREFERENCE_BLOCK"
    }

    fn evaluate(&self, view: &ScheduleView, _ctx: &EvaluationContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for assignment in &view.assignments {
            let Some(block) = view.blocks.get(&assignment.block_id) else { continue };
            let hit = view.absences.iter().any(|absence| {
                absence.person_id == assignment.person_id
                    && !absence.blocking
                    && absence.kind == AbsenceKind::HardPreference
                    && absence.covers(block.date)
            });
            if hit {
                violations.push(violation(
                    self.id(),
                    AffectedEntities::person_and_block(assignment.person_id, block.id),
                    json!({ "date": block.date }),
                    "assignment overlaps a hard scheduling preference".to_string(),
                ));
            }
        }
        violations
    }
}

/// "Minimum coverage" per rotation per block (spec §4.B Tier-2).
pub struct MinimumCoverageRule;

impl Constraint for MinimumCoverageRule {
    fn id(&self) -> &'static str {
        "TIER2_MINIMUM_COVERAGE"
    }

    fn evaluate(&self, view: &ScheduleView, _ctx: &EvaluationContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for block in view.blocks_in_window(view.range_start, view.range_end) {
            let mut counts: std::collections::HashMap<uuid::Uuid, u32> = std::collections::HashMap::new();
            for assignment in view.assignments_for_block(block.id) {
                *counts.entry(assignment.rotation_id).or_insert(0) += 1;
            }
            for rotation in view.rotations.values() {
                let count = counts.get(&rotation.id).copied().unwrap_or(0);
                if count < rotation.min_coverage {
                    violations.push(violation(
                        self.id(),
                        AffectedEntities {
                            person_ids: vec![],
                            block_ids: vec![block.id],
                            rotation_ids: vec![rotation.id],
                        },
                        json!({ "covered": count, "minimum": rotation.min_coverage }),
                        format!("{} is understaffed on {} ({} of {})", rotation.name, block.date, count, rotation.min_coverage),
                    ));
                }
            }
        }
        violations
    }
}

/// Monday of the ISO week containing `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Residents not on a blocking rotation must have the PGY-level-specific
/// count of continuity clinic half-days every week (spec §4.B Tier-2).
/// A Night Float week is "blocking": the rotation itself precludes clinic
/// attendance, so the week is excluded rather than flagged.
pub struct ContinuityClinicRule;

impl Constraint for ContinuityClinicRule {
    fn id(&self) -> &'static str {
        "TIER2_CONTINUITY_CLINIC"
    }

    fn evaluate(&self, view: &ScheduleView, ctx: &EvaluationContext) -> Vec<Violation> {
        let mut violations = Vec::new();
        for person in view.people.values().filter(|p| p.is_active() && p.role.is_resident()) {
            let Some(pgy_level) = person.pgy_level() else { continue };
            let required = ctx.config.continuity_clinic_half_days.get(&pgy_level).copied().unwrap_or(1);

            let mut weeks: std::collections::BTreeMap<NaiveDate, (u32, bool)> = std::collections::BTreeMap::new();
            for assignment in view.assignments_for(person.id) {
                let Some(block) = view.blocks.get(&assignment.block_id) else { continue };
                let Some(rotation) = view.rotations.get(&assignment.rotation_id) else { continue };
                let entry = weeks.entry(week_start(block.date)).or_insert((0, false));
                if rotation.category == RotationCategory::Clinic {
                    entry.0 += 1;
                }
                if rotation.category == RotationCategory::NightFloat {
                    entry.1 = true;
                }
            }

            for (week, (clinic_half_days, blocking)) in weeks {
                if blocking || clinic_half_days >= required {
                    continue;
                }
                violations.push(violation(
                    self.id(),
                    AffectedEntities::person(person.id),
                    json!({ "week_start": week, "required": required, "actual": clinic_half_days, "pgy_level": pgy_level }),
                    format!(
                        "{} has {} continuity clinic half-day(s) in the week of {} (requires {})",
                        person.display_name, clinic_half_days, week, required
                    ),
                ));
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use residency_config::EngineConfig;
    use residency_domain::{CallEquityCounters, FacultyRoleTag, Person, PersonRole, PersonStatus, RequiredQualifications, RotationTemplate, Session};
    use std::collections::HashSet;
    use uuid::Uuid;

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

    #[allow(dead_code)]
    fn faculty() -> Person {
        Person {
            id: Uuid::new_v4(),
            display_name: "Test Faculty".to_string(),
            role: PersonRole::Faculty { role_tag: FacultyRoleTag::Core, specialties: HashSet::new() },
            email: "faculty@example.org".to_string(),
            counters: CallEquityCounters::default(),
            status: PersonStatus::Active,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    fn block(date: NaiveDate) -> residency_domain::Block {
        residency_domain::Block {
            id: Uuid::new_v4(),
            date,
            session: Session::Am,
            sequence_number: 1,
            is_weekend: false,
            is_holiday: false,
            holiday_name: None,
        }
    }

    fn rotation(category: RotationCategory) -> RotationTemplate {
        RotationTemplate {
            id: Uuid::new_v4(),
            name: "Test Rotation".to_string(),
            category,
            required_qualifications: RequiredQualifications::default(),
            min_coverage: 1,
            max_coverage: 4,
        }
    }

    fn assignment(block_id: Uuid, person_id: Uuid, rotation_id: Uuid) -> residency_domain::Assignment {
        residency_domain::Assignment { id: Uuid::new_v4(), block_id, person_id, rotation_id, notes: None, created_at: fixed_now(), updated_at: fixed_now() }
    }

    fn view_with(
        people: Vec<Person>,
        blocks: Vec<residency_domain::Block>,
        rotations: Vec<RotationTemplate>,
        assignments: Vec<residency_domain::Assignment>,
    ) -> ScheduleView {
        let mut view = ScheduleView {
            range_start: blocks.first().map(|b| b.date).unwrap_or_default(),
            range_end: blocks.last().map(|b| b.date).unwrap_or_else(|| blocks.first().map(|b| b.date).unwrap_or_default()),
            ..Default::default()
        };
        view.people = people.into_iter().map(|p| (p.id, p)).collect();
        view.blocks = blocks.into_iter().map(|b| (b.id, b)).collect();
        view.rotations = rotations.into_iter().map(|r| (r.id, r)).collect();
        view.assignments = assignments;
        view
    }

    /// `view_with` derives `range_start` from the earliest block, so every
    /// fixture here includes an anchor block dated the academic year start
    /// to stand in for it, distinct from the block actually carrying the
    /// FMIT assignment.
    #[test]
    fn fmit_sequencing_passes_when_pgy1_completes_fmit_within_180_days() {
        let person = resident(1);
        let year_start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let fmit = rotation(RotationCategory::Other("FMIT".to_string()));
        let anchor = block(year_start);
        let blk = block(year_start + Duration::days(30));
        let view = view_with(
            vec![person.clone()],
            vec![anchor, blk.clone()],
            vec![fmit.clone()],
            vec![assignment(blk.id, person.id, fmit.id)],
        );
        let config = EngineConfig::default_for_tests();
        let ctx = EvaluationContext { config: &config };
        assert!(FmitSequencingRule.evaluate(&view, &ctx).is_empty());
    }

    #[test]
    fn fmit_sequencing_flags_pgy1_with_no_fmit_rotation() {
        let person = resident(1);
        let year_start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let inpatient = rotation(RotationCategory::Inpatient);
        let anchor = block(year_start);
        let blk = block(year_start + Duration::days(30));
        let view = view_with(
            vec![person.clone()],
            vec![anchor, blk.clone()],
            vec![inpatient.clone()],
            vec![assignment(blk.id, person.id, inpatient.id)],
        );
        let config = EngineConfig::default_for_tests();
        let ctx = EvaluationContext { config: &config };
        let violations = FmitSequencingRule.evaluate(&view, &ctx);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].affected.person_ids, vec![person.id]);
    }

    #[test]
    fn fmit_sequencing_ignores_an_fmit_rotation_past_the_180_day_deadline() {
        let person = resident(1);
        let year_start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let fmit = rotation(RotationCategory::Other("FMIT".to_string()));
        let anchor = block(year_start);
        let blk = block(year_start + Duration::days(200));
        let view = view_with(
            vec![person.clone()],
            vec![anchor, blk.clone()],
            vec![fmit.clone()],
            vec![assignment(blk.id, person.id, fmit.id)],
        );
        let config = EngineConfig::default_for_tests();
        let ctx = EvaluationContext { config: &config };
        assert_eq!(FmitSequencingRule.evaluate(&view, &ctx).len(), 1);
    }

    #[test]
    fn continuity_clinic_flags_pgy2_week_with_only_one_half_day() {
        let person = resident(2);
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let clinic = rotation(RotationCategory::Clinic);
        let blk = block(monday);
        let view = view_with(vec![person.clone()], vec![blk.clone()], vec![clinic.clone()], vec![assignment(blk.id, person.id, clinic.id)]);
        let config = EngineConfig::default_for_tests();
        let ctx = EvaluationContext { config: &config };
        let violations = ContinuityClinicRule.evaluate(&view, &ctx);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].context["required"], 2);
        assert_eq!(violations[0].context["actual"], 1);
    }

    #[test]
    fn continuity_clinic_passes_pgy1_with_one_half_day() {
        let person = resident(1);
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let clinic = rotation(RotationCategory::Clinic);
        let blk = block(monday);
        let view = view_with(vec![person.clone()], vec![blk.clone()], vec![clinic.clone()], vec![assignment(blk.id, person.id, clinic.id)]);
        let config = EngineConfig::default_for_tests();
        let ctx = EvaluationContext { config: &config };
        assert!(ContinuityClinicRule.evaluate(&view, &ctx).is_empty());
    }

    #[test]
    fn continuity_clinic_excludes_a_week_blocked_by_night_float() {
        let person = resident(2);
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let nf = rotation(RotationCategory::NightFloat);
        let blk = block(monday);
        let view = view_with(vec![person.clone()], vec![blk.clone()], vec![nf.clone()], vec![assignment(blk.id, person.id, nf.id)]);
        let config = EngineConfig::default_for_tests();
        let ctx = EvaluationContext { config: &config };
        assert!(ContinuityClinicRule.evaluate(&view, &ctx).is_empty());
    }

    #[test]
    fn night_float_post_call_flags_assignment_the_day_after_a_stretch() {
        let person = resident(2);
        let start = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let nf = rotation(RotationCategory::NightFloat);
        let inpatient = rotation(RotationCategory::Inpatient);
        let nf_block = block(start);
        let post_call_block = block(start + Duration::days(1));
        let view = view_with(
            vec![person.clone()],
            vec![nf_block.clone(), post_call_block.clone()],
            vec![nf.clone(), inpatient.clone()],
            vec![assignment(nf_block.id, person.id, nf.id), assignment(post_call_block.id, person.id, inpatient.id)],
        );
        let config = EngineConfig::default_for_tests();
        let ctx = EvaluationContext { config: &config };
        let violations = NightFloatPostCallRule.evaluate(&view, &ctx);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint_id, "TIER2_NF_POST_CALL");
    }
}
