use anyhow::Result;
use async_trait::async_trait;
use haggle_core::{AgentTurnResult, Message};

/// One conversational exchange per turn. Implementations may suspend for a
/// seconds-scale duration and must surface failures as errors, never as
/// silent no-ops; the session maps an error to its retryable failure path.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn converse(
        &self,
        policy_text: &str,
        history: &[Message],
        utterance: &str,
    ) -> Result<AgentTurnResult>;
}
