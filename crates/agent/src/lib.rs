//! Agent gateway - the conversational side of the negotiation engine.
//!
//! This crate owns everything that talks to the LLM-backed pricing agent:
//! - `gateway` - the `AgentGateway` contract the core depends on
//! - `prompt` - the system policy text restating total, items, and floor
//! - `openai` - an OpenAI-compatible HTTP adapter with the `finalize_deal`
//!   function tool
//! - `runtime` - the async driver for one request/response turn
//!
//! # Safety principle
//!
//! The agent is free-text capable, but its structured `finalize_deal` action
//! is the ONLY path to a committed discount, and even that action is
//! untrusted: the core re-validates every proposed final price against the
//! pricing policy before anything seals. Plain text claiming acceptance is an
//! ordinary counter-message.

pub mod gateway;
pub mod openai;
pub mod prompt;
pub mod runtime;

pub use gateway::AgentGateway;
pub use openai::HttpAgentGateway;
pub use runtime::NegotiationRuntime;
