//! Background rollback-window monitor (spec §4.D "Auto-detection
//! post-commit", §5.1): a `kameo` actor wrapping the swap engine, woken
//! periodically by the spawned loop in `Engine::new` rather than polling
//! itself, matching the reference's actor-as-owned-state pattern
//! (`actors::pack_cache::PackCacheActor`).

use chrono::Utc;
use kameo::Actor;
use kameo::message::{Context, Message};

use residency_swap::SwapEngine;

#[derive(Actor)]
pub struct RollbackMonitorActor {
    swaps: SwapEngine,
}

impl RollbackMonitorActor {
    pub fn new(swaps: SwapEngine) -> Self {
        Self { swaps }
    }
}

pub struct Sweep;

impl Message<Sweep> for RollbackMonitorActor {
    type Reply = ();

    async fn handle(&mut self, _msg: Sweep, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        match self.swaps.auto_detect_rollbacks(Utc::now()).await {
            Ok(rolled_back) if !rolled_back.is_empty() => {
                tracing::warn!(count = rolled_back.len(), swap_ids = ?rolled_back, "auto-detection rolled back swaps");
            }
            Ok(_) => {}
            Err(err) => tracing::error!(error = %err, "auto-detection sweep failed"),
        }
    }
}
