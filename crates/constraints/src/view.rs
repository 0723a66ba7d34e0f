//! In-memory, read-only projection the generator and swap engine assemble
//! from store queries before evaluating constraints against it (spec §4.B
//! "`ScheduleView`"). Never persisted itself.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use residency_domain::{Absence, Assignment, Block, CallAssignment, Person, RotationTemplate};

#[derive(Debug, Clone, Default)]
pub struct ScheduleView {
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub people: HashMap<Uuid, Person>,
    pub rotations: HashMap<Uuid, RotationTemplate>,
    pub blocks: HashMap<Uuid, Block>,
    pub assignments: Vec<Assignment>,
    pub call_assignments: Vec<CallAssignment>,
    pub absences: Vec<Absence>,
    pub certifications: HashMap<Uuid, Vec<String>>,
    pub clearances: HashMap<Uuid, bool>,
    /// Opaque additive hours supplied by the caller (spec §1.2).
    pub moonlighting_hours: HashMap<Uuid, f64>,
}

impl ScheduleView {
    pub fn assignments_for(&self, person_id: Uuid) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.person_id == person_id)
    }

    pub fn call_assignments_for(&self, person_id: Uuid) -> impl Iterator<Item = &CallAssignment> {
        self.call_assignments.iter().filter(move |c| c.person_id == person_id)
    }

    pub fn assignments_for_block(&self, block_id: Uuid) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.block_id == block_id)
    }

    pub fn blocks_in_window(&self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = &Block> {
        self.blocks.values().filter(move |b| b.date >= start && b.date <= end)
    }

    /// Duty hours for `person_id` across `[window_start, window_start +
    /// 27 days]`, including any opaque moonlighting contribution (spec
    /// §1.2, §8 "sum(duty_hours(p, w)) / 4 <= 80").
    pub fn duty_hours_in_window(
        &self,
        person_id: Uuid,
        window_start: NaiveDate,
        rotation_hour_weights: &HashMap<String, f64>,
    ) -> f64 {
        let window_end = window_start + Duration::days(27);
        let scheduled: f64 = self
            .assignments_for(person_id)
            .filter_map(|a| {
                let block = self.blocks.get(&a.block_id)?;
                if block.date < window_start || block.date > window_end {
                    return None;
                }
                let rotation = self.rotations.get(&a.rotation_id)?;
                Some(rotation_hour_weights.get(rotation.category.config_key()).copied().unwrap_or(8.0) / 2.0)
            })
            .sum();

        let call_hours: f64 = self
            .call_assignments_for(person_id)
            .filter(|c| c.date >= window_start && c.date <= window_end)
            .map(|_| rotation_hour_weights.get("Call").copied().unwrap_or(14.0))
            .sum();

        let moonlighting = self.moonlighting_hours.get(&person_id).copied().unwrap_or(0.0);

        scheduled + call_hours + moonlighting
    }

    /// Count of calendar days in the 28-day window with neither an AM nor
    /// PM assignment nor a call assignment (spec §8 "full_days_off").
    pub fn full_days_off_in_window(&self, person_id: Uuid, window_start: NaiveDate) -> u32 {
        let window_end = window_start + Duration::days(27);
        let mut busy_dates: std::collections::HashSet<NaiveDate> = self
            .assignments_for(person_id)
            .filter_map(|a| self.blocks.get(&a.block_id))
            .filter(|b| b.date >= window_start && b.date <= window_end)
            .map(|b| b.date)
            .collect();
        busy_dates.extend(
            self.call_assignments_for(person_id)
                .filter(|c| c.date >= window_start && c.date <= window_end)
                .map(|c| c.date),
        );

        let mut count = 0u32;
        let mut date = window_start;
        while date <= window_end {
            if !busy_dates.contains(&date) {
                count += 1;
            }
            date += Duration::days(1);
        }
        count
    }

    pub fn certifications_for(&self, person_id: Uuid) -> &[String] {
        self.certifications.get(&person_id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn has_clearance(&self, person_id: Uuid) -> bool {
        self.clearances.get(&person_id).copied().unwrap_or(false)
    }

    /// Whether any blocking absence of `person_id` covers `date` (spec §8
    /// "no blocking absence of the person covers a.block.date").
    pub fn has_blocking_absence(&self, person_id: Uuid, date: NaiveDate) -> bool {
        self.absences
            .iter()
            .any(|absence| absence.person_id == person_id && absence.blocking && absence.covers(date))
    }
}
