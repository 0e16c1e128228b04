pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod session;

pub use domain::cart::{AppliedDiscount, Cart, CartItem, CartSnapshot, ItemId};
pub use domain::message::{Message, Speaker, Transcript};
pub use errors::DomainError;
pub use pricing::{discount_for, FloorRule, PricingPolicy};
pub use session::{
    AgentTurnResult, FinalizeRequest, NegotiationOutcome, NegotiationSession, SessionId,
    SessionStatus, TurnTicket,
};
