//! Loads the `ScheduleView` slice a resilience query needs: the requested
//! window plus the roster and rotation catalog, same shape as the
//! generator's own `preprocessing::prepare` (spec §4.E).

use std::collections::HashMap;

use chrono::NaiveDate;

use residency_constraints::ScheduleView;
use residency_domain::CoreError;
use residency_storage::{AbsenceRepository, AssignmentRepository, BlockRepository, PersonRepository, RotationRepository};

pub struct Repos<'a> {
    pub people: &'a PersonRepository,
    pub rotations: &'a RotationRepository,
    pub blocks: &'a BlockRepository,
    pub absences: &'a AbsenceRepository,
    pub assignments: &'a AssignmentRepository,
}

/// Always loads every active person, regardless of the query's `subset`
/// filter: coverage for the window depends on everyone's assignments, and
/// `subset` only narrows *which* people get individually disrupted in the
/// N-1/N-2 sweep (spec §4.E "tested subset (default: all active)").
pub async fn build(repos: &Repos<'_>, start: NaiveDate, end: NaiveDate) -> Result<ScheduleView, CoreError> {
    let people = repos.people.list_active(None).await.map_err(CoreError::from)?;
    let rotations = repos.rotations.list_all().await.map_err(CoreError::from)?;
    let blocks = repos.blocks.list_range(start, end).await.map_err(CoreError::from)?;
    let assignments = repos.assignments.list_for_range(start, end).await.map_err(CoreError::from)?;
    let call_assignments = repos.assignments.list_call_for_range(start, end).await.map_err(CoreError::from)?;
    let absences = repos.absences.list_overlapping(&[], start, end).await.map_err(CoreError::from)?;

    let mut certifications = HashMap::new();
    let mut clearances = HashMap::new();
    for person in &people {
        certifications.insert(person.id, repos.people.certifications_for(person.id).await.map_err(CoreError::from)?);
        clearances.insert(person.id, repos.people.has_clearance(person.id).await.map_err(CoreError::from)?);
    }

    Ok(ScheduleView {
        range_start: start,
        range_end: end,
        people: people.into_iter().map(|p| (p.id, p)).collect(),
        rotations: rotations.into_iter().map(|r| (r.id, r)).collect(),
        blocks: blocks.into_iter().map(|b| (b.id, b)).collect(),
        assignments,
        call_assignments,
        absences,
        certifications,
        clearances,
        moonlighting_hours: HashMap::new(),
    })
}
