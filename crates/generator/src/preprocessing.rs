//! Step 1 of the generator pipeline: expand the date range into Blocks,
//! load the roster/absences/prior assignments, and compute the open
//! coverage slots the solver must fill (spec §4.C.1 "Preprocessing" /
//! "Variable model").

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use residency_constraints::ScheduleView;
use residency_domain::{CallType, CoreError, GenerationRequest};
use residency_storage::{AbsenceRepository, AssignmentRepository, BlockRepository, PersonRepository, RotationRepository};

/// One open (block, rotation) coverage unit the solver must fill.
#[derive(Debug, Clone)]
pub struct Slot {
    pub block_id: Uuid,
    pub rotation_id: Uuid,
}

/// One open overnight/weekend call coverage unit.
#[derive(Debug, Clone)]
pub struct CallSlot {
    pub date: NaiveDate,
    pub call_type: CallType,
    pub is_weekend: bool,
    pub is_holiday: bool,
}

pub struct PreparedInput {
    pub view: ScheduleView,
    pub slots: Vec<Slot>,
    pub call_slots: Vec<CallSlot>,
    /// Eligible person ids per rotation, precomputed once so the solver
    /// never re-evaluates `is_satisfied_by` per candidate probe.
    pub candidates_by_rotation: HashMap<Uuid, Vec<Uuid>>,
}

pub struct Repos<'a> {
    pub people: &'a PersonRepository,
    pub rotations: &'a RotationRepository,
    pub blocks: &'a BlockRepository,
    pub absences: &'a AbsenceRepository,
    pub assignments: &'a AssignmentRepository,
}

pub async fn prepare(repos: &Repos<'_>, request: &GenerationRequest) -> Result<PreparedInput, CoreError> {
    let blocks = repos
        .blocks
        .ensure_range(request.start_date, request.end_date)
        .await
        .map_err(CoreError::from)?;

    let people = repos
        .people
        .list_active(request.pgy_levels.as_deref())
        .await
        .map_err(CoreError::from)?;

    let rotations = match &request.rotation_ids {
        Some(ids) => repos.rotations.list_by_ids(ids).await.map_err(CoreError::from)?,
        None => repos.rotations.list_all().await.map_err(CoreError::from)?,
    };

    let absences = repos
        .absences
        .list_overlapping(&[], request.start_date, request.end_date)
        .await
        .map_err(CoreError::from)?;

    let existing_assignments = repos
        .assignments
        .list_for_range(request.start_date, request.end_date)
        .await
        .map_err(CoreError::from)?;

    let existing_call_assignments = repos
        .assignments
        .list_call_for_range(request.start_date, request.end_date)
        .await
        .map_err(CoreError::from)?;

    let mut certifications = HashMap::new();
    let mut clearances = HashMap::new();
    for person in &people {
        certifications.insert(person.id, repos.people.certifications_for(person.id).await.map_err(CoreError::from)?);
        clearances.insert(person.id, repos.people.has_clearance(person.id).await.map_err(CoreError::from)?);
    }

    let moonlighting_hours: HashMap<Uuid, f64> =
        request.moonlighting.iter().map(|m| (m.person_id, m.hours)).collect();

    let mut view = ScheduleView {
        range_start: request.start_date,
        range_end: request.end_date,
        people: people.into_iter().map(|p| (p.id, p)).collect(),
        rotations: rotations.into_iter().map(|r| (r.id, r)).collect(),
        blocks: blocks.into_iter().map(|b| (b.id, b)).collect(),
        assignments: existing_assignments,
        call_assignments: existing_call_assignments,
        absences,
        certifications,
        clearances,
        moonlighting_hours,
    };
    view.blocks.retain(|_, b| b.date >= request.start_date && b.date <= request.end_date);

    let candidates_by_rotation = build_candidates(&view);
    let slots = build_slots(&view);
    let call_slots = build_call_slots(&view);

    Ok(PreparedInput {
        view,
        slots,
        call_slots,
        candidates_by_rotation,
    })
}

fn build_candidates(view: &ScheduleView) -> HashMap<Uuid, Vec<Uuid>> {
    let mut result = HashMap::new();
    for rotation in view.rotations.values() {
        let eligible: Vec<Uuid> = view
            .people
            .values()
            .filter(|p| p.is_active())
            .filter(|p| {
                rotation.is_satisfied_by(p.pgy_level(), view.certifications_for(p.id), view.has_clearance(p.id))
            })
            .map(|p| p.id)
            .collect();
        result.insert(rotation.id, eligible);
    }
    result
}

fn build_slots(view: &ScheduleView) -> Vec<Slot> {
    let mut blocks: Vec<_> = view.blocks.values().collect();
    blocks.sort_by_key(|b| b.sequence_number);

    let mut slots = Vec::new();
    for block in blocks {
        for rotation in view.rotations.values() {
            let already_covered = view.assignments_for_block(block.id).filter(|a| a.rotation_id == rotation.id).count();
            let remaining = rotation.min_coverage.saturating_sub(already_covered as u32);
            for _ in 0..remaining {
                slots.push(Slot { block_id: block.id, rotation_id: rotation.id });
            }
        }
    }
    slots
}

fn build_call_slots(view: &ScheduleView) -> Vec<CallSlot> {
    let mut slots = Vec::new();
    let mut date = view.range_start;
    while date <= view.range_end {
        let is_weekend = matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun);
        let call_types: &[CallType] = if is_weekend {
            &[CallType::Weekend]
        } else {
            &[CallType::Overnight]
        };
        for call_type in call_types {
            let already_filled = view.call_assignments.iter().any(|c| c.date == date && c.call_type == *call_type);
            if !already_filled {
                slots.push(CallSlot { date, call_type: *call_type, is_weekend, is_holiday: false });
            }
        }
        date += Duration::days(1);
    }
    slots
}
