//! Wires the resilience evaluator's pure, in-memory checks into the swap
//! engine's Tier-3 decision (spec §4.D "Tier 3: resilience delta").

use residency_config::EngineConfig;
use residency_constraints::ScheduleView;
use residency_resilience::{impact, utilization};
use residency_swap::ResilienceDelta;

/// Flags a swap whose projected schedule either moves `effective_utilization`
/// by more than 5 points or introduces a new zero-margin N-1 risk that
/// wasn't present before the swap.
pub struct ResilienceGate;

impl ResilienceDelta for ResilienceGate {
    fn flags(&self, before: &ScheduleView, after: &ScheduleView, config: &EngineConfig) -> bool {
        let before_utilization = utilization::compute(before, &config.utilization_thresholds);
        let after_utilization = utilization::compute(after, &config.utilization_thresholds);
        if (after_utilization.rate - before_utilization.rate).abs() > 0.05 {
            return true;
        }

        after.people.keys().any(|person_id| {
            !impact::introduces_zero_margin(before, *person_id) && impact::introduces_zero_margin(after, *person_id)
        })
    }
}
