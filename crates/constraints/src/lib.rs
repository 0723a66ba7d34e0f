//! The constraint framework: a pure evaluator over an in-memory
//! `ScheduleView`, and the Tier 1/2/3 catalog (spec §4.B).

pub mod tier1;
pub mod tier2;
pub mod tier3;
pub mod view;

pub use view::ScheduleView;

use residency_config::EngineConfig;
use residency_domain::{EvaluationResult, Scope, Violation};

/// Tunable values every constraint reads from configuration rather than
/// hard-coding, so operators can adjust them without a redeploy (spec §9
/// open questions).
pub struct EvaluationContext<'a> {
    pub config: &'a EngineConfig,
}

/// A pure evaluator: one implementing type per catalog entry (spec §4.B.1).
/// Implementations must not mutate `view` or perform I/O.
pub trait Constraint: Send + Sync {
    fn id(&self) -> &'static str;
    fn evaluate(&self, view: &ScheduleView, ctx: &EvaluationContext) -> Vec<Violation>;
}

fn catalog() -> Vec<Box<dyn Constraint>> {
    let mut entries: Vec<Box<dyn Constraint>> = Vec::new();
    entries.extend(tier1::catalog());
    entries.extend(tier2::catalog());
    entries.extend(tier3::catalog());
    entries
}

/// Aggregates every catalog entry against `view`, never short-circuiting
/// on a hard violation (spec §4.B "Aggregate evaluation API"). `_scope` is
/// accepted for forward compatibility with scoped re-evaluation (e.g. a
/// swap engine checking only the affected persons); the current catalog
/// evaluates the whole view and callers filter by `Violation::affected`.
pub fn evaluate(view: &ScheduleView, _scope: Scope, ctx: &EvaluationContext) -> EvaluationResult {
    let mut result = EvaluationResult::default();
    for constraint in catalog() {
        for violation in constraint.evaluate(view, ctx) {
            result.push(violation);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use residency_config::EngineConfig;

    #[test]
    fn evaluate_on_empty_view_has_no_violations() {
        let view = ScheduleView::default();
        let config = EngineConfig::default_for_tests();
        let ctx = EvaluationContext { config: &config };
        let result = evaluate(&view, Scope::Global, &ctx);
        assert!(result.violations.is_empty());
        assert_eq!(result.total_penalty, 0.0);
    }
}
