//! Summarizes an `EvaluationResult` into the `ValidationResponse` shape
//! (spec §6 `validate`), grounded on the same per-`(block, rotation)`
//! coverage count `constraints::tier2::MinimumCoverageRule` uses.

use std::collections::HashMap;

use residency_constraints::ScheduleView;
use residency_domain::{EvaluationResult, Tier, ValidationResponse, ValidationStatistics};

fn coverage_rate(view: &ScheduleView) -> f64 {
    let mut counts: HashMap<(uuid::Uuid, uuid::Uuid), u32> = HashMap::new();
    for assignment in &view.assignments {
        *counts.entry((assignment.block_id, assignment.rotation_id)).or_insert(0) += 1;
    }

    let mut required = 0u32;
    let mut filled = 0u32;
    for block in view.blocks_in_window(view.range_start, view.range_end) {
        for rotation in view.rotations.values() {
            required += rotation.min_coverage;
            let count = counts.get(&(block.id, rotation.id)).copied().unwrap_or(0);
            filled += count.min(rotation.min_coverage);
        }
    }

    if required == 0 { 1.0 } else { filled as f64 / required as f64 }
}

pub fn summarize(view: &ScheduleView, evaluation: &EvaluationResult) -> ValidationResponse {
    let statistics = ValidationStatistics {
        tier1_count: evaluation.tier_breakdown.tier1_violations,
        tier2_count: evaluation.tier_breakdown.tier2_violations,
        tier3_count: evaluation.tier_breakdown.tier3_violations,
        total_penalty: evaluation.violations.iter().filter(|v| v.tier == Tier::Optimization).map(|v| v.penalty).sum(),
    };

    ValidationResponse {
        valid: statistics.tier1_count == 0,
        total_violations: evaluation.violations.len() as u32,
        violations: evaluation.violations.clone(),
        coverage_rate: coverage_rate(view),
        statistics,
    }
}

#[cfg(test)]
mod tests {
    use residency_constraints::ScheduleView;
    use residency_domain::{EvaluationResult, TierBreakdown};

    use super::*;

    #[test]
    fn empty_view_has_full_coverage_rate() {
        let view = ScheduleView::default();
        assert_eq!(coverage_rate(&view), 1.0);
    }

    #[test]
    fn tier1_violations_make_the_response_invalid() {
        let view = ScheduleView::default();
        let evaluation = EvaluationResult {
            violations: Vec::new(),
            total_penalty: 0.0,
            tier_breakdown: TierBreakdown { tier1_violations: 1, tier2_violations: 0, tier3_violations: 0 },
        };
        let response = summarize(&view, &evaluation);
        assert!(!response.valid);
        assert_eq!(response.statistics.tier1_count, 1);
    }
}
