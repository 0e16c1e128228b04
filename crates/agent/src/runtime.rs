use haggle_core::{
    Cart, CartSnapshot, DomainError, FloorRule, Message, NegotiationOutcome, NegotiationSession,
    SessionStatus,
};
use tokio::sync::Mutex;

use crate::gateway::AgentGateway;
use crate::prompt;

/// Drives one negotiation session against an agent gateway.
///
/// The session sits behind a mutex, but the lock is released across the
/// gateway await: the `AwaitingResponse` status rejects concurrent
/// submissions, and the per-turn generation check discards a result that
/// arrives after the session was abandoned or the turn superseded. Those two
/// guards are the entire concurrency model.
pub struct NegotiationRuntime<G> {
    gateway: G,
    policy_text: String,
    session: Mutex<NegotiationSession>,
}

impl<G> NegotiationRuntime<G>
where
    G: AgentGateway,
{
    pub fn open(gateway: G, snapshot: &CartSnapshot, rule: FloorRule, currency: &str) -> Self {
        let session = NegotiationSession::open(snapshot, rule, currency);
        let policy_text =
            prompt::system_policy_text(session.policy(), &snapshot.item_names(), currency);

        tracing::info!(
            session_id = %session.id().0,
            total = %session.policy().total,
            floor = %session.policy().floor,
            "negotiation session opened"
        );

        Self { gateway, policy_text, session: Mutex::new(session) }
    }

    /// Runs one full turn: submit the offer, call the gateway, apply the
    /// result. Returns a `DomainError` only when the turn never started
    /// (empty offer, turn in flight, closed session); gateway failures
    /// resolve to `NegotiationOutcome::GatewayFailure` with the session back
    /// in `Open`.
    pub async fn submit_offer(&self, text: &str) -> Result<NegotiationOutcome, DomainError> {
        let (session_id, ticket) = {
            let mut session = self.session.lock().await;
            let ticket = session.submit_offer(text)?;
            (session.id(), ticket)
        };

        tracing::debug!(
            session_id = %session_id.0,
            generation = ticket.generation,
            outcome = ?NegotiationOutcome::Pending,
            "offer submitted, awaiting agent"
        );

        let result =
            self.gateway.converse(&self.policy_text, &ticket.history, &ticket.utterance).await;

        let mut session = self.session.lock().await;
        let outcome = match result {
            Ok(turn) => session.resolve_turn(ticket.generation, turn),
            Err(error) => {
                tracing::warn!(
                    session_id = %session_id.0,
                    generation = ticket.generation,
                    error = %error,
                    "agent gateway call failed"
                );
                session.fail_turn(ticket.generation, &error.to_string())
            }
        };

        match &outcome {
            NegotiationOutcome::Finalized { final_price, discount } => {
                tracing::info!(
                    session_id = %session_id.0,
                    final_price = %final_price,
                    discount = %discount,
                    "negotiation sealed"
                );
            }
            NegotiationOutcome::Countered(_) => {
                tracing::debug!(
                    session_id = %session_id.0,
                    generation = ticket.generation,
                    "agent countered"
                );
            }
            NegotiationOutcome::Discarded => {
                tracing::debug!(
                    session_id = %session_id.0,
                    generation = ticket.generation,
                    "stale turn result discarded"
                );
            }
            NegotiationOutcome::GatewayFailure(_) | NegotiationOutcome::Pending => {}
        }

        Ok(outcome)
    }

    /// Closes the session without committing anything. An in-flight gateway
    /// call is left to complete; its result will be discarded on arrival.
    pub async fn abandon(&self) {
        let mut session = self.session.lock().await;
        session.abandon();
        tracing::info!(session_id = %session.id().0, "negotiation session abandoned");
    }

    pub async fn status(&self) -> SessionStatus {
        self.session.lock().await.status()
    }

    pub async fn transcript(&self) -> Vec<Message> {
        self.session.lock().await.messages().to_vec()
    }

    /// Commits the sealed discount into the cart's pricing summary.
    pub async fn commit(&self, cart: &mut Cart) -> Result<(), DomainError> {
        let session = self.session.lock().await;
        cart.commit(&session)?;
        tracing::info!(
            session_id = %session.id().0,
            discount = %cart.effective_discount(),
            payable = %cart.payable(),
            "discount committed to cart"
        );
        Ok(())
    }

    pub fn policy_text(&self) -> &str {
        &self.policy_text
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use haggle_core::{
        AgentTurnResult, Cart, CartItem, DomainError, FinalizeRequest, FloorRule, ItemId, Message,
        NegotiationOutcome, SessionStatus,
    };
    use rust_decimal::Decimal;
    use tokio::sync::{Mutex, Notify};

    use crate::gateway::AgentGateway;

    use super::NegotiationRuntime;

    struct ScriptedGateway {
        script: Mutex<VecDeque<Result<AgentTurnResult>>>,
    }

    impl ScriptedGateway {
        fn new(script: Vec<Result<AgentTurnResult>>) -> Self {
            Self { script: Mutex::new(script.into_iter().collect()) }
        }

        fn counter(text: &str) -> Result<AgentTurnResult> {
            Ok(AgentTurnResult { reply: Some(text.to_owned()), finalize: None })
        }

        fn finalize(price: i64) -> Result<AgentTurnResult> {
            Ok(AgentTurnResult {
                reply: None,
                finalize: Some(FinalizeRequest { final_price: Decimal::from(price) }),
            })
        }
    }

    #[async_trait]
    impl AgentGateway for ScriptedGateway {
        async fn converse(
            &self,
            _policy_text: &str,
            _history: &[Message],
            _utterance: &str,
        ) -> Result<AgentTurnResult> {
            self.script.lock().await.pop_front().unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }
    }

    /// Gateway that parks until released, for exercising the in-flight guard.
    struct BlockedGateway {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl AgentGateway for BlockedGateway {
        async fn converse(
            &self,
            _policy_text: &str,
            _history: &[Message],
            _utterance: &str,
        ) -> Result<AgentTurnResult> {
            self.release.notified().await;
            Ok(AgentTurnResult { reply: Some("done".to_owned()), finalize: None })
        }
    }

    fn demo_cart() -> Cart {
        Cart::from_items(vec![CartItem {
            id: ItemId("phone".to_owned()),
            name: "Phone".to_owned(),
            unit_price: Decimal::from(1000),
            quantity: 1,
        }])
    }

    fn runtime_with<G: AgentGateway>(gateway: G, cart: &Cart) -> NegotiationRuntime<G> {
        NegotiationRuntime::open(gateway, &cart.snapshot(), FloorRule::default(), "₹")
    }

    #[tokio::test]
    async fn counter_then_seal_then_commit() {
        let mut cart = demo_cart();
        let gateway = ScriptedGateway::new(vec![
            ScriptedGateway::counter("I can do 870."),
            ScriptedGateway::finalize(900),
        ]);
        let runtime = runtime_with(gateway, &cart);

        let outcome = runtime.submit_offer("700").await.expect("turn starts");
        assert_eq!(outcome, NegotiationOutcome::Countered("I can do 870.".to_owned()));
        assert_eq!(runtime.status().await, SessionStatus::Open);

        let outcome = runtime.submit_offer("900").await.expect("turn starts");
        assert_eq!(
            outcome,
            NegotiationOutcome::Finalized {
                final_price: Decimal::from(900),
                discount: Decimal::from(100),
            }
        );
        assert_eq!(runtime.status().await, SessionStatus::Sealed);

        runtime.commit(&mut cart).await.expect("snapshot unchanged");
        assert_eq!(cart.payable(), Decimal::from(900));
    }

    #[tokio::test]
    async fn policy_violating_finalize_keeps_session_open() {
        let cart = demo_cart();
        let gateway = ScriptedGateway::new(vec![ScriptedGateway::finalize(500)]);
        let runtime = runtime_with(gateway, &cart);

        let outcome = runtime.submit_offer("500 final").await.expect("turn starts");
        assert!(matches!(outcome, NegotiationOutcome::Countered(_)));
        assert_eq!(runtime.status().await, SessionStatus::Open);

        let mut cart = cart;
        let error = runtime.commit(&mut cart).await.expect_err("nothing sealed");
        assert_eq!(error, DomainError::NotSealed { status: SessionStatus::Open });
    }

    #[tokio::test]
    async fn gateway_failure_recovers_and_next_turn_can_seal() {
        let cart = demo_cart();
        let gateway = ScriptedGateway::new(vec![
            Err(anyhow!("connection reset by peer")),
            ScriptedGateway::finalize(900),
        ]);
        let runtime = runtime_with(gateway, &cart);

        let outcome = runtime.submit_offer("900").await.expect("turn starts");
        assert!(matches!(outcome, NegotiationOutcome::GatewayFailure(_)));
        assert_eq!(runtime.status().await, SessionStatus::Open);

        let transcript = runtime.transcript().await;
        assert!(transcript.last().expect("retry prompt").text.contains("try again"));

        let outcome = runtime.submit_offer("900").await.expect("turn starts");
        assert!(matches!(outcome, NegotiationOutcome::Finalized { .. }));
    }

    #[tokio::test]
    async fn submission_while_turn_in_flight_is_rejected() {
        let cart = demo_cart();
        let release = Arc::new(Notify::new());
        let runtime =
            Arc::new(runtime_with(BlockedGateway { release: release.clone() }, &cart));

        let background = {
            let runtime = runtime.clone();
            tokio::spawn(async move { runtime.submit_offer("900").await })
        };

        // Wait until the first turn is parked inside the gateway call.
        while runtime.status().await != SessionStatus::AwaitingResponse {
            tokio::task::yield_now().await;
        }

        let error = runtime.submit_offer("880").await.expect_err("turn already in flight");
        assert_eq!(error, DomainError::TurnInFlight);

        release.notify_one();
        let outcome = background.await.expect("task joins").expect("turn resolves");
        assert_eq!(outcome, NegotiationOutcome::Countered("done".to_owned()));
    }

    #[tokio::test]
    async fn result_arriving_after_abandon_is_discarded() {
        let cart = demo_cart();
        let release = Arc::new(Notify::new());
        let runtime =
            Arc::new(runtime_with(BlockedGateway { release: release.clone() }, &cart));

        let background = {
            let runtime = runtime.clone();
            tokio::spawn(async move { runtime.submit_offer("900").await })
        };

        while runtime.status().await != SessionStatus::AwaitingResponse {
            tokio::task::yield_now().await;
        }

        runtime.abandon().await;
        release.notify_one();

        let outcome = background.await.expect("task joins").expect("turn resolves");
        assert_eq!(outcome, NegotiationOutcome::Discarded);
        assert_eq!(runtime.status().await, SessionStatus::Aborted);
    }

    #[tokio::test]
    async fn empty_offer_never_reaches_the_gateway() {
        let cart = demo_cart();
        // An empty script would fail the turn if the gateway were called.
        let gateway = ScriptedGateway::new(Vec::new());
        let runtime = runtime_with(gateway, &cart);

        let error = runtime.submit_offer("   ").await.expect_err("empty offer");
        assert_eq!(error, DomainError::EmptyOffer);
        assert_eq!(runtime.transcript().await.len(), 1);
    }
}
