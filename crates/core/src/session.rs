use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cart::CartSnapshot;
use crate::domain::message::{Message, Speaker, Transcript};
use crate::errors::DomainError;
use crate::pricing::{discount_for, FloorRule, PricingPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Open,
    AwaitingResponse,
    Sealed,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sealed | Self::Aborted)
    }
}

/// The structured action that is the only authoritative path to a committed
/// discount. Free text claiming acceptance is treated as an ordinary counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub final_price: Decimal,
}

/// What the agent gateway returned for one turn: a free-text reply, a
/// finalize action, or both (finalize wins, but only after re-validation).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentTurnResult {
    pub reply: Option<String>,
    pub finalize: Option<FinalizeRequest>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// A turn has been submitted and its gateway call has not resolved yet.
    Pending,
    /// The agent replied without sealing; the session stays open.
    Countered(String),
    /// The agent's finalize action passed policy validation and sealed the
    /// session.
    Finalized { final_price: Decimal, discount: Decimal },
    /// The gateway call failed; the session reverted to open and the buyer
    /// may resubmit.
    GatewayFailure(String),
    /// The result arrived for a turn that is no longer live (superseded
    /// generation or closed session) and was ignored.
    Discarded,
}

/// Everything the gateway call needs for one turn, captured at submission so
/// the session lock never spans the call itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnTicket {
    pub generation: u64,
    pub history: Vec<Message>,
    pub utterance: String,
}

/// Two-party negotiation state machine over one cart snapshot.
///
/// `Open -> AwaitingResponse -> {Open | Sealed | Aborted}`, with `Sealed` and
/// `Aborted` terminal. The `AwaitingResponse` status is the sole concurrency
/// guard: at most one turn is in flight, and further submissions are rejected
/// rather than queued. Each started turn bumps `generation`, so a late result
/// from an abandoned or superseded turn is provably discardable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiationSession {
    id: SessionId,
    policy: PricingPolicy,
    snapshot_fingerprint: String,
    currency: String,
    transcript: Transcript,
    status: SessionStatus,
    applied_discount: Option<Decimal>,
    generation: u64,
}

impl NegotiationSession {
    /// Opens a negotiation over the given snapshot, seeding the agent's
    /// greeting so the buyer sees the total and an invitation to make an
    /// offer.
    pub fn open(snapshot: &CartSnapshot, rule: FloorRule, currency: &str) -> Self {
        let policy = PricingPolicy::from_total(snapshot.total(), rule);
        let mut transcript = Transcript::default();
        transcript.push(
            Speaker::Agent,
            format!(
                "The total is {currency}{}. I can offer you a small discount if you purchase \
                 now. What's your offer?",
                policy.total
            ),
        );

        Self {
            id: SessionId::new(),
            policy,
            snapshot_fingerprint: snapshot.fingerprint().to_owned(),
            currency: currency.to_owned(),
            transcript,
            status: SessionStatus::Open,
            applied_discount: None,
            generation: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn applied_discount(&self) -> Option<Decimal> {
        self.applied_discount
    }

    pub fn snapshot_fingerprint(&self) -> &str {
        &self.snapshot_fingerprint
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a turn: appends the buyer message, moves to `AwaitingResponse`,
    /// and returns the replay history plus utterance for the gateway call.
    ///
    /// Whitespace-only offers are rejected before any state change, and a
    /// submission while a turn is in flight has no observable effect.
    pub fn submit_offer(&mut self, text: &str) -> Result<TurnTicket, DomainError> {
        match self.status {
            SessionStatus::Open => {}
            SessionStatus::AwaitingResponse => return Err(DomainError::TurnInFlight),
            SessionStatus::Sealed | SessionStatus::Aborted => {
                return Err(DomainError::SessionClosed { status: self.status });
            }
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyOffer);
        }

        let history = self.transcript.messages().to_vec();
        self.transcript.push(Speaker::Buyer, trimmed);
        self.generation += 1;
        self.status = SessionStatus::AwaitingResponse;

        Ok(TurnTicket { generation: self.generation, history, utterance: trimmed.to_owned() })
    }

    /// Applies a successful gateway result to the turn identified by
    /// `generation`.
    ///
    /// A finalize action is re-validated against the pricing policy before
    /// anything seals; an out-of-range price is treated as a protocol
    /// violation by the agent and surfaced as a corrective counter-message
    /// with the session back in `Open`.
    pub fn resolve_turn(&mut self, generation: u64, result: AgentTurnResult) -> NegotiationOutcome {
        if !self.turn_is_live(generation) {
            return NegotiationOutcome::Discarded;
        }

        if let Some(finalize) = result.finalize {
            return match self.policy.clamp_accepted_price(finalize.final_price) {
                Ok(final_price) => {
                    let discount = discount_for(self.policy.total, final_price);
                    self.applied_discount = Some(discount);
                    self.transcript.push(
                        Speaker::Agent,
                        format!("Deal! Applying a discount of {}{discount}.", self.currency),
                    );
                    self.status = SessionStatus::Sealed;
                    NegotiationOutcome::Finalized { final_price, discount }
                }
                Err(_) => {
                    let text = format!(
                        "That price is out of range for this cart. I can only agree between \
                         {currency}{} and {currency}{}.",
                        self.policy.floor,
                        self.policy.total,
                        currency = self.currency,
                    );
                    self.transcript.push(Speaker::Agent, text.clone());
                    self.status = SessionStatus::Open;
                    NegotiationOutcome::Countered(text)
                }
            };
        }

        let text =
            result.reply.unwrap_or_else(|| "Let me think about that...".to_owned());
        self.transcript.push(Speaker::Agent, text.clone());
        self.status = SessionStatus::Open;
        NegotiationOutcome::Countered(text)
    }

    /// Records a gateway failure for the turn identified by `generation`.
    /// The session reverts to `Open` with a retry prompt; no state is lost.
    pub fn fail_turn(&mut self, generation: u64, reason: &str) -> NegotiationOutcome {
        if !self.turn_is_live(generation) {
            return NegotiationOutcome::Discarded;
        }

        self.transcript.push(
            Speaker::Agent,
            "I'm having trouble reaching the pricing service. Please try again.",
        );
        self.status = SessionStatus::Open;
        NegotiationOutcome::GatewayFailure(reason.to_owned())
    }

    /// Closes the session without committing anything. Valid from any
    /// non-terminal state; an in-flight gateway result arriving afterwards is
    /// discarded by the generation check.
    pub fn abandon(&mut self) {
        if !self.status.is_terminal() {
            self.status = SessionStatus::Aborted;
        }
    }

    fn turn_is_live(&self, generation: u64) -> bool {
        self.status == SessionStatus::AwaitingResponse && generation == self.generation
    }
}
