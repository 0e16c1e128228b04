use rust_decimal::Decimal;
use thiserror::Error;

use crate::session::SessionStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("offer text is empty")]
    EmptyOffer,
    #[error("a turn is already awaiting the agent's response")]
    TurnInFlight,
    #[error("session is {status:?} and accepts no further turns")]
    SessionClosed { status: SessionStatus },
    #[error("proposed price {proposed} is outside the acceptable range [{floor}, {total}]")]
    PolicyViolation { proposed: Decimal, floor: Decimal, total: Decimal },
    #[error("session was sealed over a different cart snapshot")]
    StaleSnapshot,
    #[error("cannot commit a discount from a session in {status:?} state")]
    NotSealed { status: SessionStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Message safe to show the shopper. Negotiation errors are terminal to
    /// the turn, never the session, so every variant has a textual fallback.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyOffer => "Please type an offer before sending.",
            Self::TurnInFlight => "The agent is still responding to your last offer.",
            Self::SessionClosed { .. } => "This negotiation has ended.",
            Self::PolicyViolation { .. } => "That price is outside the range I can accept.",
            Self::StaleSnapshot => {
                "Your cart changed since this deal was agreed. Please negotiate again."
            }
            Self::NotSealed { .. } => "No deal has been agreed for this cart yet.",
            Self::InvariantViolation(_) => "Something went wrong. Please try again.",
        }
    }
}
