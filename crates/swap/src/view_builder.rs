//! Loads the `ScheduleView` slice a swap needs to evaluate (spec §4.D
//! "as if the swap were committed"): a window wide enough to cover the
//! 28-day rolling windows touched by the affected week(s).

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

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

/// The evaluation horizon for one swap: 27 days on either side of the
/// earliest/latest affected week, matching `ScheduleView::duty_hours_in_window`'s
/// own 28-day lookahead. Rolling windows that start before `start` or need
/// data past `end` are outside this swap's validation horizon by design —
/// a swap only re-checks the weeks it can disturb, not the roster's entire
/// history.
pub fn window_for(weeks: &[NaiveDate]) -> (NaiveDate, NaiveDate) {
    let earliest = *weeks.iter().min().expect("at least one week");
    let latest = *weeks.iter().max().expect("at least one week");
    (earliest - Duration::days(27), latest + Duration::days(6 + 27))
}

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
