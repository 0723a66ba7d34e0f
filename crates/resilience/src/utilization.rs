//! Utilization classification (spec §4.E "Utilization").

use residency_config::UtilizationThresholds;
use residency_constraints::ScheduleView;
use residency_domain::UtilizationClass;
use residency_domain::UtilizationReport;

fn classify(rate: f64, thresholds: &UtilizationThresholds) -> UtilizationClass {
    if rate > thresholds.black {
        UtilizationClass::Black
    } else if rate > thresholds.red {
        UtilizationClass::Red
    } else if rate > thresholds.orange {
        UtilizationClass::Orange
    } else if rate > thresholds.yellow {
        UtilizationClass::Yellow
    } else {
        UtilizationClass::Green
    }
}

/// `effective_utilization = scheduled_duty_units / (available_people *
/// slots_per_person * range_length)`, with `slots_per_person` taken as the
/// two half-day sessions a day holds (spec §4.E). `wait_time_multiplier =
/// 1 / (1 - rate)`, capped so a fully-saturated window doesn't divide by
/// zero.
pub fn compute(view: &ScheduleView, thresholds: &UtilizationThresholds) -> UtilizationReport {
    let range_days = (view.range_end - view.range_start).num_days() + 1;
    let available_people = view.people.values().filter(|p| p.is_active()).count() as f64;
    let slots_per_person = 2.0;

    let capacity = available_people * slots_per_person * range_days as f64;
    let scheduled_duty_units = view.assignments.len() as f64 + view.call_assignments.len() as f64;

    let rate = if capacity > 0.0 { (scheduled_duty_units / capacity).min(1.5) } else { 0.0 };
    let wait_time_multiplier = 1.0 / (1.0 - rate.min(0.99));

    UtilizationReport {
        rate,
        class: classify(rate, thresholds),
        wait_time_multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_boundaries_match_thresholds() {
        let thresholds = UtilizationThresholds::default();
        assert_eq!(classify(0.5, &thresholds), UtilizationClass::Green);
        assert_eq!(classify(0.75, &thresholds), UtilizationClass::Yellow);
        assert_eq!(classify(0.82, &thresholds), UtilizationClass::Orange);
        assert_eq!(classify(0.9, &thresholds), UtilizationClass::Red);
        assert_eq!(classify(0.97, &thresholds), UtilizationClass::Black);
    }

    #[test]
    fn wait_time_multiplier_is_capped_near_saturation() {
        let thresholds = UtilizationThresholds::default();
        let report_class = classify(0.99, &thresholds);
        assert_eq!(report_class, UtilizationClass::Black);
    }
}
