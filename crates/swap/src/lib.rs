//! Swap execution: validated, atomic mutation of a small number of
//! assignments for two people over at most two weeks, with a rollback
//! window (spec §4.D).
//!
//! structural validation → mutation planning → three-tier safety check →
//! decision → (snapshot → commit → audit) on Proceed/Approved Flag.

pub mod pipeline;
pub mod view_builder;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use residency_config::EngineConfig;
use residency_constraints::{EvaluationContext, ScheduleView};
use residency_domain::{
    AuditEvent, AuditEventKind, CoreError, RollbackRequest, RollbackResponse, Scope, SnapshotEntry, SwapRecord,
    SwapRequest, SwapResponse, SwapStatus,
};
use residency_storage::{
    AbsenceRepository, AssignmentRepository, AuditRepository, BlockRepository, PersonRepository, RotationRepository,
    SnapshotRepository, SwapRepository,
};

use pipeline::MutationPlan;
use view_builder::Repos;

/// Hook for the Tier-3 half of the safety check that only the resilience
/// evaluator can answer (utilization delta, N-1 margin — spec §4.D phase
/// 2 "Tier 3: resilience delta"). `SwapEngine` runs without one and falls
/// back to soft-constraint warnings only; `residency-engine` wires in the
/// real implementation once both crates are constructed.
pub trait ResilienceDelta: Send + Sync {
    /// Returns `true` if the swap should be flagged on resilience grounds.
    fn flags(&self, before: &ScheduleView, after: &ScheduleView, config: &EngineConfig) -> bool;
}

#[derive(Clone)]
pub struct SwapEngine {
    people: PersonRepository,
    rotations: RotationRepository,
    blocks: BlockRepository,
    absences: AbsenceRepository,
    assignments: AssignmentRepository,
    swaps: SwapRepository,
    snapshots: SnapshotRepository,
    audit: AuditRepository,
    config: EngineConfig,
    resilience: Option<Arc<dyn ResilienceDelta>>,
}

impl SwapEngine {
    pub fn new(
        people: PersonRepository,
        rotations: RotationRepository,
        blocks: BlockRepository,
        absences: AbsenceRepository,
        assignments: AssignmentRepository,
        swaps: SwapRepository,
        snapshots: SnapshotRepository,
        audit: AuditRepository,
        config: EngineConfig,
    ) -> Self {
        Self {
            people,
            rotations,
            blocks,
            absences,
            assignments,
            swaps,
            snapshots,
            audit,
            config,
            resilience: None,
        }
    }

    /// Installs the resilience evaluator's delta check (spec §4.D phase 2
    /// Tier 3). Optional: without one, Tier 3 contributes warnings only.
    pub fn with_resilience(mut self, resilience: Arc<dyn ResilienceDelta>) -> Self {
        self.resilience = Some(resilience);
        self
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

    /// Runs phases 1-6 of the swap pipeline for a fresh request (spec
    /// §4.D). Proceeds straight to commit when the decision is `Proceed`;
    /// a `Flag` decision leaves the `SwapRecord` `Pending` awaiting
    /// `approve_and_execute`; a `Reject` decision records the rejection
    /// and returns without mutating anything.
    pub async fn submit(&self, request: &SwapRequest) -> Result<SwapResponse, CoreError> {
        pipeline::structural_validate(&self.people, request).await?;

        let mut weeks = vec![request.source_week];
        if let Some(week) = request.target_week {
            weeks.push(week);
        }
        let (window_start, window_end) = view_builder::window_for(&weeks);
        let view = view_builder::build(&self.repos(), window_start, window_end).await?;

        let plan = pipeline::plan_mutations(&view, request)?;
        let projected = pipeline::project(&view, &plan.mutations);

        let ctx = EvaluationContext { config: &self.config };
        let evaluation = residency_constraints::evaluate(&projected, Scope::Global, &ctx);

        let mut outcome = pipeline::decide(&evaluation, plan.mutations.len(), &request.reason, request.swap_type);
        if matches!(outcome.decision, residency_domain::SwapDecision::Proceed) {
            if let Some(resilience) = &self.resilience {
                if resilience.flags(&view, &projected, &self.config) {
                    outcome.decision = residency_domain::SwapDecision::Flag;
                    outcome.escalation_level = Some(residency_domain::EscalationLevel::ProgramDirector);
                }
            }
        }

        let swap_id = Uuid::new_v4();
        let now = Utc::now();
        let record = SwapRecord {
            id: swap_id,
            swap_type: request.swap_type,
            source_person_id: request.source_person_id,
            source_week_start: request.source_week,
            target_person_id: request.target_person_id,
            target_week_start: request.target_week,
            status: SwapStatus::Pending,
            reason: request.reason.clone(),
            requested_at: now,
            requested_by: request.requested_by,
            approved_at: None,
            approved_by: None,
            executed_at: None,
            executed_by: None,
            rolled_back_at: None,
            rolled_back_by: None,
            rollback_reason: None,
            transaction_id: None,
        };
        self.swaps.insert(&record).await.map_err(CoreError::from)?;

        self.append_audit(swap_id, AuditEventKind::Request { payload: serde_json::to_value(request).unwrap_or_default() }, Some(request.requested_by), 0)
            .await?;
        self.append_audit(
            swap_id,
            AuditEventKind::Validation { summary: serde_json::to_value(&evaluation).unwrap_or_default() },
            None,
            0,
        )
        .await?;
        self.append_audit(swap_id, AuditEventKind::Decision { outcome: format!("{:?}", outcome.decision) }, None, 0)
            .await?;

        match outcome.decision {
            residency_domain::SwapDecision::Reject => {
                self.swaps.set_status(swap_id, SwapStatus::Rejected).await.map_err(CoreError::from)?;
            }
            residency_domain::SwapDecision::Flag => {
                tracing::info!(swap_id = %swap_id, escalation = ?outcome.escalation_level, "swap flagged for approval");
            }
            residency_domain::SwapDecision::Proceed => {
                self.commit(swap_id, &plan, request.requested_by).await?;
            }
        }

        Ok(SwapResponse {
            swap_id,
            decision: outcome.decision,
            tier1: outcome.tier1,
            tier2: outcome.tier2,
            tier3: outcome.tier3,
            warnings: outcome.warnings,
            escalation_level: outcome.escalation_level,
        })
    }

    /// Approves a `Flag`ged swap and runs phases 4-6 (spec §4.D "on an
    /// Approved Flag"). Re-derives the mutation plan against current state
    /// rather than trusting the plan computed at submission time, since
    /// the schedule may have changed in the interim.
    pub async fn approve_and_execute(&self, swap_id: Uuid, approver: Uuid) -> Result<SwapResponse, CoreError> {
        let record = self.swaps.get_by_id(swap_id).await.map_err(CoreError::from)?;
        if !record.status.can_transition_to(SwapStatus::Approved) {
            return Err(CoreError::conflict(format!("swap {swap_id} cannot be approved from {:?}", record.status)));
        }

        let request = SwapRequest {
            swap_type: record.swap_type,
            source_person_id: record.source_person_id,
            source_week: record.source_week_start,
            target_person_id: record.target_person_id,
            target_week: record.target_week_start,
            reason: record.reason.clone(),
            requested_by: record.requested_by,
        };

        let mut weeks = vec![request.source_week];
        if let Some(week) = request.target_week {
            weeks.push(week);
        }
        let (window_start, window_end) = view_builder::window_for(&weeks);
        let view = view_builder::build(&self.repos(), window_start, window_end).await?;
        let plan = pipeline::plan_mutations(&view, &request)?;
        let projected = pipeline::project(&view, &plan.mutations);

        let ctx = EvaluationContext { config: &self.config };
        let evaluation = residency_constraints::evaluate(&projected, Scope::Global, &ctx);
        let outcome = pipeline::decide(&evaluation, plan.mutations.len(), &request.reason, request.swap_type);
        if !outcome.tier1.violations.is_empty() {
            return Err(CoreError::invariant_with(
                "swap is no longer Tier-1 feasible",
                serde_json::json!({ "swap_id": swap_id }),
            ));
        }

        let now = Utc::now();
        self.swaps.mark_approved(swap_id, now, approver).await.map_err(CoreError::from)?;
        self.append_audit(swap_id, AuditEventKind::Decision { outcome: "approved".to_string() }, Some(approver), 0).await?;

        self.commit(swap_id, &plan, approver).await?;

        Ok(SwapResponse {
            swap_id,
            decision: residency_domain::SwapDecision::Proceed,
            tier1: outcome.tier1,
            tier2: outcome.tier2,
            tier3: outcome.tier3,
            warnings: outcome.warnings,
            escalation_level: None,
        })
    }

    /// Phases 4-6: snapshot, commit, audit (spec §4.D).
    async fn commit(&self, swap_id: Uuid, plan: &MutationPlan, executor: Uuid) -> Result<(), CoreError> {
        let assignment_entries = plan
            .assignment_snapshot
            .iter()
            .map(|(id, prior)| SnapshotEntry { entity_id: *id, prior_person_id: *prior })
            .collect();
        let call_entries = plan
            .call_snapshot
            .iter()
            .map(|(id, prior)| SnapshotEntry { entity_id: *id, prior_person_id: *prior })
            .collect();
        self.snapshots.take(swap_id, assignment_entries, call_entries).await.map_err(CoreError::from)?;

        let executed_at = Utc::now();
        let mut tx = self.assignments.pool().begin().await.map_err(residency_storage::StorageError::Query).map_err(CoreError::from)?;

        let transaction_id: (i64,) = sqlx::query_as("INSERT INTO transaction_log DEFAULT VALUES RETURNING id")
            .fetch_one(&mut *tx)
            .await
            .map_err(residency_storage::StorageError::Query)
            .map_err(CoreError::from)?;

        AssignmentRepository::apply_assignments_tx(
            &mut tx,
            &plan.mutations,
            &plan.affected_person_ids,
            &self.people,
            &self.config.rotation_hour_weights,
        )
        .await
        .map_err(CoreError::from)?;

        self.swaps
            .mark_executed_tx(&mut tx, swap_id, executed_at, executor, transaction_id.0)
            .await
            .map_err(CoreError::from)?;

        tx.commit().await.map_err(residency_storage::StorageError::Query).map_err(CoreError::from)?;

        self.append_audit(
            swap_id,
            AuditEventKind::Execution { transaction_id: transaction_id.0 },
            Some(executor),
            transaction_id.0,
        )
        .await?;

        tracing::info!(swap_id = %swap_id, transaction_id = transaction_id.0, "executed swap");

        Ok(())
    }

    /// Rolls back an executed swap within its window (spec §4.D phase 7).
    pub async fn rollback(&self, request: &RollbackRequest) -> Result<RollbackResponse, CoreError> {
        let record = self.swaps.get_by_id(request.swap_id).await.map_err(CoreError::from)?;
        let now = Utc::now();
        if !record.is_rollback_eligible(now, self.config.rollback_window) {
            return Ok(RollbackResponse {
                success: false,
                rolled_back_at: None,
                reason: Some("WindowExpired".to_string()),
            });
        }

        let snapshot = self.snapshots.get_by_swap_id(request.swap_id).await.map_err(CoreError::from)?;
        self.snapshots.restore(&snapshot, &self.people).await.map_err(CoreError::from)?;
        self.swaps
            .mark_rolled_back(request.swap_id, now, request.requested_by, &request.reason)
            .await
            .map_err(CoreError::from)?;

        self.append_audit(request.swap_id, AuditEventKind::Rollback { reason: request.reason.clone() }, Some(request.requested_by), 0)
            .await?;

        Ok(RollbackResponse { success: true, rolled_back_at: Some(now), reason: None })
    }

    /// Auto-detection sweep (spec §4.D "Auto-detection post-commit"):
    /// re-runs the Tier-1 check against every swap executed within the
    /// configured window and rolls back any that is now infeasible,
    /// attributed to the system actor (a nil UUID).
    pub async fn auto_detect_rollbacks(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, CoreError> {
        let since = now - self.config.auto_detection_window;
        let candidates = self.swaps.list_executed_since(since).await.map_err(CoreError::from)?;

        let mut rolled_back = Vec::new();
        for record in candidates {
            let mut weeks = vec![record.source_week_start];
            if let Some(week) = record.target_week_start {
                weeks.push(week);
            }
            let (window_start, window_end) = view_builder::window_for(&weeks);
            let view = view_builder::build(&self.repos(), window_start, window_end).await?;
            let ctx = EvaluationContext { config: &self.config };
            let evaluation = residency_constraints::evaluate(&view, Scope::Global, &ctx);

            if evaluation.tier_breakdown.tier1_violations == 0 {
                continue;
            }

            let snapshot = self.snapshots.get_by_swap_id(record.id).await.map_err(CoreError::from)?;
            self.snapshots.restore(&snapshot, &self.people).await.map_err(CoreError::from)?;
            self.swaps
                .mark_rolled_back(record.id, now, Uuid::nil(), "auto-detection: Tier-1 violation after commit")
                .await
                .map_err(CoreError::from)?;
            self.append_audit(
                record.id,
                AuditEventKind::AutoRollback { reason: "Tier-1 violation detected within the auto-detection window".to_string() },
                None,
                0,
            )
            .await?;
            rolled_back.push(record.id);
        }

        Ok(rolled_back)
    }

    async fn append_audit(&self, swap_id: Uuid, kind: AuditEventKind, actor_id: Option<Uuid>, transaction_id: i64) -> Result<(), CoreError> {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            correlation_id: swap_id,
            kind,
            actor_id,
            recorded_at: Utc::now(),
            transaction_id,
        };
        self.audit.append(&event).await.map_err(CoreError::from)
    }
}
