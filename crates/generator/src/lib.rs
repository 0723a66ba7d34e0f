//! Schedule generation: the pipeline that turns a `GenerationRequest` into
//! committed Assignments/CallAssignments (spec §4.C, §6).
//!
//! `prepare` (preprocessing.rs) → `solve` (solver.rs) → in-memory
//! post-solve validation against the full constraint catalog → commit via
//! `AssignmentRepository::apply_assignments`, gated by the idempotency
//! registry (registry.rs).

pub mod preprocessing;
pub mod registry;
pub mod solver;

use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use residency_config::EngineConfig;
use residency_constraints::{EvaluationContext, ScheduleView};
use residency_domain::{
    Assignment, CallAssignment, CoreError, GenerationRequest, GenerationResponse, NfPostCallAudit, RunStats,
    RunStatus, Scope, ValidationSummary,
};
use residency_storage::{AbsenceRepository, AssignmentMutation, AssignmentRepository, BlockRepository, PersonRepository, RotationRepository};

use preprocessing::Repos;
use registry::{Admission, RunRegistry};

/// Everything the generator needs to run against the store, bundled so
/// `Engine` can construct one `Generator` per pool rather than threading
/// five repositories through every call.
#[derive(Clone)]
pub struct Generator {
    people: PersonRepository,
    rotations: RotationRepository,
    blocks: BlockRepository,
    absences: AbsenceRepository,
    assignments: AssignmentRepository,
    config: EngineConfig,
    registry: RunRegistry,
}

impl Generator {
    pub fn new(
        people: PersonRepository,
        rotations: RotationRepository,
        blocks: BlockRepository,
        absences: AbsenceRepository,
        assignments: AssignmentRepository,
        config: EngineConfig,
    ) -> Self {
        Self {
            people,
            rotations,
            blocks,
            absences,
            assignments,
            config,
            registry: RunRegistry::new(),
        }
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

    /// Runs the full generation pipeline for `request` (spec §6 `generate`).
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, CoreError> {
        if let Some(key) = request.idempotency_key.as_deref() {
            match self.registry.admit(key, &request)? {
                Admission::Cached(response) => return Ok(response),
                Admission::Proceed => {}
            }
        }

        match self.run(&request).await {
            Ok(response) => {
                if let Some(key) = request.idempotency_key.as_deref() {
                    self.registry.complete(key, &request, response.clone());
                }
                Ok(response)
            }
            Err(err) => {
                if let Some(key) = request.idempotency_key.as_deref() {
                    self.registry.abandon(key);
                }
                Err(err)
            }
        }
    }

    async fn run(&self, request: &GenerationRequest) -> Result<GenerationResponse, CoreError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();

        let input = preprocessing::prepare(&self.repos(), request).await?;
        let seed = seed_from_request(request);

        let outcome = solver::solve(
            request.algorithm,
            &input,
            &self.config.rotation_hour_weights,
            request.timeout_seconds,
            self.config.heartbeat_period,
            seed,
        );

        let mut projected = input.view.clone();
        apply_projected(&mut projected, &outcome.mutations);

        let ctx = EvaluationContext { config: &self.config };
        let evaluation = residency_constraints::evaluate(&projected, Scope::Global, &ctx);

        let nf_pc_audit = NfPostCallAudit {
            violations_found: evaluation
                .violations
                .iter()
                .filter(|v| v.constraint_id == "TIER2_NF_POST_CALL")
                .count() as u32,
            affected_person_ids: evaluation
                .violations
                .iter()
                .filter(|v| v.constraint_id == "TIER2_NF_POST_CALL")
                .flat_map(|v| v.affected.person_ids.clone())
                .collect(),
        };

        let total_slots = input.slots.len() + input.call_slots.len();
        let coverage_rate = if total_slots == 0 {
            1.0
        } else {
            1.0 - (outcome.unassigned_slots as f64 / total_slots as f64)
        };

        let status = if evaluation.tier_breakdown.tier1_violations > 0 {
            RunStatus::Failed
        } else if outcome.unassigned_slots > 0 || evaluation.tier_breakdown.tier2_violations > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };

        if !matches!(status, RunStatus::Failed) && !outcome.mutations.is_empty() {
            self.assignments
                .apply_assignments(
                    &outcome.mutations,
                    &outcome.affected_person_ids,
                    &self.people,
                    &self.config.rotation_hour_weights,
                )
                .await
                .map_err(CoreError::from)?;
        }

        let override_count = evaluation.tier_breakdown.tier2_violations;

        tracing::info!(
            run_id = %run_id,
            algorithm = ?request.algorithm,
            status = ?status,
            assignments_written = outcome.mutations.len(),
            unassigned_slots = outcome.unassigned_slots,
            tier1_violations = evaluation.tier_breakdown.tier1_violations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation run finished"
        );

        Ok(GenerationResponse {
            run_id,
            status,
            stats: RunStats {
                assignments_written: outcome.mutations.len() as u32,
                unassigned_slots: outcome.unassigned_slots,
                elapsed_ms: started.elapsed().as_millis() as u64,
                iterations: outcome.iterations,
            },
            validation: ValidationSummary {
                violations: evaluation.violations,
                coverage_rate,
            },
            nf_pc_audit,
            override_count,
        })
    }
}

fn seed_from_request(request: &GenerationRequest) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    request.start_date.hash(&mut hasher);
    request.end_date.hash(&mut hasher);
    request.idempotency_key.hash(&mut hasher);
    hasher.finish()
}

/// Applies the solver's proposed mutations onto an in-memory clone of the
/// view so post-solve validation runs against the schedule the commit
/// would actually produce, without touching the store (spec §4.C.1 "the
/// solver's output is validated before it is committed").
fn apply_projected(view: &mut ScheduleView, mutations: &[AssignmentMutation]) {
    for mutation in mutations {
        match mutation {
            AssignmentMutation::UpsertAssignment { id, block_id, person_id, rotation_id, notes } => {
                view.assignments.retain(|a| !(a.person_id == *person_id && a.block_id == *block_id));
                view.assignments.push(Assignment {
                    id: *id,
                    block_id: *block_id,
                    person_id: *person_id,
                    rotation_id: *rotation_id,
                    notes: notes.clone(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                });
            }
            AssignmentMutation::DeleteAssignment { id } => {
                view.assignments.retain(|a| a.id != *id);
            }
            AssignmentMutation::UpsertCallAssignment { id, date, call_type, person_id, is_weekend, is_holiday } => {
                view.call_assignments.retain(|c| !(c.date == *date && c.call_type == *call_type));
                view.call_assignments.push(CallAssignment {
                    id: *id,
                    date: *date,
                    person_id: *person_id,
                    call_type: *call_type,
                    is_weekend: *is_weekend,
                    is_holiday: *is_holiday,
                });
            }
            AssignmentMutation::DeleteCallAssignment { date, call_type } => {
                view.call_assignments.retain(|c| !(c.date == *date && c.call_type == *call_type));
            }
        }
    }
}
