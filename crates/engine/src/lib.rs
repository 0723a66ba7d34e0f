//! Facade wiring schedule generation, validation, swap execution, and
//! resilience evaluation behind the five external operations of spec §6.1,
//! owning the worker pool, the idempotency/in-flight registries, and the
//! background rollback-window monitor of spec §5.

pub mod concurrency;
pub mod resilience_actor;
pub mod resilience_gate;
pub mod rollback_monitor;
pub mod validation;

use std::time::Duration;

use kameo::actor::ActorRef;
use sqlx::PgPool;
use uuid::Uuid;

use residency_config::EngineConfig;
use residency_constraints::{EvaluationContext, Scope};
use residency_domain::{
    CoreError, GenerationRequest, GenerationResponse, ResilienceQuery, ResilienceResponse, RollbackRequest,
    RollbackResponse, SwapRequest, SwapResponse, ValidationRequest, ValidationResponse,
};
use residency_generator::Generator;
use residency_resilience::ResilienceEvaluator;
use residency_storage::{
    AbsenceRepository, AssignmentRepository, AuditRepository, BlockRepository, PersonRepository, RotationRepository,
    SnapshotRepository, SwapRepository,
};
use residency_swap::SwapEngine;

use concurrency::PersonLocks;
use resilience_actor::{Evaluate, ResilienceActor};
use resilience_gate::ResilienceGate;
use rollback_monitor::{RollbackMonitorActor, Sweep};

/// Bundles every repository the engine's components need, built once from a
/// single pool so the five public operations share one connection pool and
/// one configuration (spec §5.1 "`residency-engine` ... owning the worker
/// pool").
#[derive(Clone)]
struct Repos {
    people: PersonRepository,
    rotations: RotationRepository,
    blocks: BlockRepository,
    absences: AbsenceRepository,
    assignments: AssignmentRepository,
    swaps: SwapRepository,
    snapshots: SnapshotRepository,
    audit: AuditRepository,
}

impl Repos {
    fn new(pool: PgPool) -> Self {
        Self {
            people: PersonRepository::new(pool.clone()),
            rotations: RotationRepository::new(pool.clone()),
            blocks: BlockRepository::new(pool.clone()),
            absences: AbsenceRepository::new(pool.clone()),
            assignments: AssignmentRepository::new(pool.clone()),
            swaps: SwapRepository::new(pool.clone()),
            snapshots: SnapshotRepository::new(pool.clone()),
            audit: AuditRepository::new(pool),
        }
    }
}

/// The single entry point every transport collaborator drives (spec §6.1).
pub struct Engine {
    generator: Generator,
    swap: SwapEngine,
    resilience: ActorRef<ResilienceActor>,
    validation_repos: Repos,
    config: EngineConfig,
    person_locks: PersonLocks,
    _rollback_monitor: ActorRef<RollbackMonitorActor>,
}

impl Engine {
    /// Wires every component against `pool` and starts the background
    /// rollback-window monitor (spec §5.1). The monitor and the resilience
    /// evaluator run as `kameo` actors; generation and swap execution stay
    /// plain `async fn`s guarded by the `DashMap`-backed registries.
    pub fn new(pool: PgPool, config: EngineConfig) -> Self {
        let repos = Repos::new(pool);

        let generator = Generator::new(
            repos.people.clone(),
            repos.rotations.clone(),
            repos.blocks.clone(),
            repos.absences.clone(),
            repos.assignments.clone(),
            config.clone(),
        );

        let swap = SwapEngine::new(
            repos.people.clone(),
            repos.rotations.clone(),
            repos.blocks.clone(),
            repos.absences.clone(),
            repos.assignments.clone(),
            repos.swaps.clone(),
            repos.snapshots.clone(),
            repos.audit.clone(),
            config.clone(),
        )
        .with_resilience(std::sync::Arc::new(ResilienceGate));

        let evaluator = ResilienceEvaluator::new(
            repos.people.clone(),
            repos.rotations.clone(),
            repos.blocks.clone(),
            repos.absences.clone(),
            repos.assignments.clone(),
            config.clone(),
        );
        let resilience = kameo::spawn(ResilienceActor::new(evaluator));

        let rollback_monitor = kameo::spawn(RollbackMonitorActor::new(swap.clone()));
        let sweep_period = config.auto_detection_window.max(Duration::from_secs(1));
        let monitor_ref = rollback_monitor.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_period);
            loop {
                ticker.tick().await;
                if monitor_ref.tell(Sweep).await.is_err() {
                    break;
                }
            }
        });

        Self {
            generator,
            swap,
            resilience,
            validation_repos: repos,
            config,
            person_locks: PersonLocks::new(),
            _rollback_monitor: rollback_monitor,
        }
    }

    /// `generate` (spec §6): delegates straight to the generator, which owns
    /// its own idempotency registry. Person-level locking happens inside the
    /// generator's own commit, same as any other assignment write.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, CoreError> {
        self.generator.generate(request).await
    }

    /// `validate` (spec §6): builds a fresh view over the requested window
    /// and summarizes the full constraint catalog's findings against it.
    pub async fn validate(&self, request: ValidationRequest) -> Result<ValidationResponse, CoreError> {
        let repos = residency_swap::view_builder::Repos {
            people: &self.validation_repos.people,
            rotations: &self.validation_repos.rotations,
            blocks: &self.validation_repos.blocks,
            absences: &self.validation_repos.absences,
            assignments: &self.validation_repos.assignments,
        };
        let view = residency_swap::view_builder::build(&repos, request.start_date, request.end_date).await?;
        let ctx = EvaluationContext { config: &self.config };
        let evaluation = residency_constraints::evaluate(&view, Scope::Global, &ctx);
        Ok(validation::summarize(&view, &evaluation))
    }

    /// `submit_swap` (spec §6, §4.D): acquires the affected persons' locks
    /// for the swap's window before handing off to the swap engine, so an
    /// overlapping generation run or second swap for the same person fails
    /// fast with `Conflict` instead of racing the pipeline's own view read.
    pub async fn submit_swap(&self, request: SwapRequest) -> Result<SwapResponse, CoreError> {
        let mut persons = vec![request.source_person_id];
        if let Some(target) = request.target_person_id {
            persons.push(target);
        }
        let end = request.target_week.unwrap_or(request.source_week);
        let (start, end) = if request.source_week <= end { (request.source_week, end) } else { (end, request.source_week) };
        let _guard = self.person_locks.acquire(&persons, start, end)?;

        self.swap.submit(&request).await
    }

    /// Approves and executes a `Flag`-decision swap left pending from
    /// `submit_swap` (spec §4.D "Approval routing").
    pub async fn approve_swap(&self, swap_id: Uuid, approver: Uuid) -> Result<SwapResponse, CoreError> {
        self.swap.approve_and_execute(swap_id, approver).await
    }

    /// `rollback` (spec §6, §4.D "Rollback window").
    pub async fn rollback(&self, request: RollbackRequest) -> Result<RollbackResponse, CoreError> {
        self.swap.rollback(&request).await
    }

    /// `resilience` (spec §6, §4.E): dispatched to the resilience actor's
    /// mailbox so the N-1/N-2 sweep runs off the caller's task while the
    /// public method still looks synchronous.
    pub async fn resilience(&self, request: ResilienceQuery) -> Result<ResilienceResponse, CoreError> {
        self.resilience
            .ask(Evaluate(request))
            .await
            .map_err(|err| CoreError::Transient { message: err.to_string(), attempts: 1 })?
    }
}
