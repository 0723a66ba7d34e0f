//! Resilience evaluation: utilization, N-1/N-2 simulation, recovery
//! planning, and the defense-in-depth level (spec §4.E). Output is pure
//! data — the generator and swap engine consume it and decide; this crate
//! never mutates the store.

pub mod impact;
pub mod recovery;
pub mod utilization;
pub mod view_builder;

use std::sync::Arc;

use uuid::Uuid;

use residency_config::EngineConfig;
use residency_domain::{CoreError, DefenseInDepthLevel, ImpactClass, ResilienceQuery, ResilienceResponse, UtilizationClass};
use residency_storage::{AbsenceRepository, AssignmentRepository, BlockRepository, PersonRepository, RotationRepository};

use recovery::Mitigation;
use view_builder::Repos;

#[derive(Clone)]
pub struct ResilienceEvaluator {
    people: PersonRepository,
    rotations: RotationRepository,
    blocks: BlockRepository,
    absences: AbsenceRepository,
    assignments: AssignmentRepository,
    config: EngineConfig,
}

impl ResilienceEvaluator {
    pub fn new(
        people: PersonRepository,
        rotations: RotationRepository,
        blocks: BlockRepository,
        absences: AbsenceRepository,
        assignments: AssignmentRepository,
        config: EngineConfig,
    ) -> Self {
        Self { people, rotations, blocks, absences, assignments, config }
    }

    fn repos(&self) -> Repos<'_> {
        Repos {
            people: &self.people,
            rotations: &self.rotations,
            blocks: &self.blocks,
            absences: &self.absences,
            assignments: &self.assignments,
        }
    }

    /// Runs the full resilience sweep for `query` (spec §6 `resilience`).
    pub async fn evaluate(&self, query: &ResilienceQuery) -> Result<ResilienceResponse, CoreError> {
        let view = view_builder::build(&self.repos(), query.start_date, query.end_date).await?;

        let subset: Vec<Uuid> = match &query.subset {
            Some(ids) => ids.iter().copied().filter(|id| view.people.contains_key(id)).collect(),
            None => view.people.values().filter(|p| p.is_active()).map(|p| p.id).collect(),
        };

        let utilization = utilization::compute(&view, &self.config.utilization_thresholds);
        let defense_in_depth_level = defense_in_depth_for(utilization.class);

        let view = Arc::new(view);
        let config = Arc::new(self.config.clone());
        let per_person = impact::simulate_n1(Arc::clone(&view), subset.clone(), Arc::clone(&config)).await;
        let fatal_pairs = impact::simulate_n2(&view, &subset);

        let mitigations = vec![
            Mitigation::SupplementalStaff { count: 1 },
            Mitigation::OvertimeBudget { hours: 40.0 },
        ];

        let mut recommended_actions = Vec::new();
        for person_impact in &per_person {
            if !matches!(person_impact.classification, ImpactClass::Critical | ImpactClass::HighImpact) {
                continue;
            }
            if let Some(plan) = recovery::plan(person_impact, &mitigations, config.supplemental_onboarding_hours) {
                recommended_actions.push(format!(
                    "{}: {} (~{:.1} day(s))",
                    person_impact.person_id, plan.strategy, plan.recovery_days
                ));
            }
        }

        tracing::info!(
            window_start = %query.start_date,
            window_end = %query.end_date,
            tested = subset.len(),
            critical = per_person.iter().filter(|p| p.classification == ImpactClass::Critical).count(),
            fatal_pairs = fatal_pairs.len(),
            utilization_class = ?utilization.class,
            "resilience evaluation finished"
        );

        Ok(ResilienceResponse {
            per_person,
            fatal_pairs,
            utilization,
            defense_in_depth_level,
            recommended_actions,
        })
    }
}

/// Maps the window's effective utilization class directly onto the
/// defense-in-depth ladder (spec §4.E leaves the mapping open; this
/// evaluator treats the live coverage rate named there as the same
/// effective_utilization computed for `Utilization`, reusing its five-way
/// classification one-for-one).
fn defense_in_depth_for(class: UtilizationClass) -> DefenseInDepthLevel {
    match class {
        UtilizationClass::Green => DefenseInDepthLevel::Prevention,
        UtilizationClass::Yellow => DefenseInDepthLevel::Control,
        UtilizationClass::Orange => DefenseInDepthLevel::SafetySystems,
        UtilizationClass::Red => DefenseInDepthLevel::Containment,
        UtilizationClass::Black => DefenseInDepthLevel::Emergency,
    }
}
