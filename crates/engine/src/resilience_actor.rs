//! Wraps the resilience evaluator in a `kameo` actor so the per-person N-1
//! sweep runs on its own mailbox, off the caller's task (spec §5.1).

use kameo::Actor;
use kameo::message::{Context, Message};

use residency_domain::{CoreError, ResilienceQuery, ResilienceResponse};
use residency_resilience::ResilienceEvaluator;

#[derive(Actor)]
pub struct ResilienceActor {
    evaluator: ResilienceEvaluator,
}

impl ResilienceActor {
    pub fn new(evaluator: ResilienceEvaluator) -> Self {
        Self { evaluator }
    }
}

pub struct Evaluate(pub ResilienceQuery);

impl Message<Evaluate> for ResilienceActor {
    type Reply = Result<ResilienceResponse, CoreError>;

    async fn handle(&mut self, msg: Evaluate, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.evaluator.evaluate(&msg.0).await
    }
}
