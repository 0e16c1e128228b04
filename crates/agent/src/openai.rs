use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use haggle_core::config::{LlmConfig, LlmProvider};
use haggle_core::{AgentTurnResult, FinalizeRequest, Message, Speaker};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::gateway::AgentGateway;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const FINALIZE_TOOL_NAME: &str = "finalize_deal";

/// Gateway adapter speaking the OpenAI-compatible chat-completions wire
/// shape (shared by OpenAI and Ollama). The `finalize_deal` tool is the
/// structured channel through which the agent may propose to seal a price.
pub struct HttpAgentGateway {
    client: reqwest::Client,
    chat_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl HttpAgentGateway {
    pub fn from_config(llm: &LlmConfig) -> Result<Self> {
        let base_url = match llm.provider {
            LlmProvider::OpenAi => {
                llm.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_owned())
            }
            LlmProvider::Ollama => llm
                .base_url
                .clone()
                .ok_or_else(|| anyhow!("ollama provider requires llm.base_url"))?,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()
            .context("failed to build HTTP client for agent gateway")?;

        Ok(Self {
            client,
            chat_url: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            api_key: llm.api_key.clone(),
            model: llm.model.clone(),
            max_retries: llm.max_retries,
        })
    }

    fn request_body(&self, policy_text: &str, history: &[Message], utterance: &str) -> Value {
        json!({
            "model": self.model,
            "messages": chat_messages(policy_text, history, utterance),
            "temperature": 0.1,
            "tools": [finalize_tool()],
        })
    }

    async fn call_once(&self, body: &Value) -> Result<ChatResponse> {
        let mut request = self.client.post(&self.chat_url).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.context("agent gateway request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("agent gateway returned {status}: {detail}"));
        }

        response.json::<ChatResponse>().await.context("agent gateway returned malformed JSON")
    }
}

#[async_trait]
impl AgentGateway for HttpAgentGateway {
    async fn converse(
        &self,
        policy_text: &str,
        history: &[Message],
        utterance: &str,
    ) -> Result<AgentTurnResult> {
        let body = self.request_body(policy_text, history, utterance);

        let mut attempt = 0u32;
        let response = loop {
            match self.call_once(&body).await {
                Ok(response) => break response,
                Err(error) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "agent gateway call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                }
                Err(error) => return Err(error),
            }
        };

        turn_result_from(response)
    }
}

/// Replay order: system policy first, then the transcript in sequence order
/// (buyer as `user`, agent as `assistant`), then the new utterance.
fn chat_messages(policy_text: &str, history: &[Message], utterance: &str) -> Vec<Value> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(json!({ "role": "system", "content": policy_text }));
    for message in history {
        let role = match message.speaker {
            Speaker::Buyer => "user",
            Speaker::Agent => "assistant",
        };
        messages.push(json!({ "role": role, "content": message.text }));
    }
    messages.push(json!({ "role": "user", "content": utterance }));
    messages
}

fn finalize_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": FINALIZE_TOOL_NAME,
            "description": "Finalize the negotiated price and apply the discount.",
            "parameters": {
                "type": "object",
                "properties": {
                    "final_price": {
                        "type": "number",
                        "description": "The agreed upon final price for the cart.",
                    },
                },
                "required": ["final_price"],
            },
        },
    })
}

fn turn_result_from(response: ChatResponse) -> Result<AgentTurnResult> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("agent gateway returned no choices"))?;

    let finalize = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .find(|call| call.function.name == FINALIZE_TOOL_NAME)
        .map(|call| {
            // Arguments arrive as a JSON-encoded string field.
            let args: FinalizeArguments = serde_json::from_str(&call.function.arguments)
                .context("finalize_deal arguments were not valid JSON")?;
            Ok::<_, anyhow::Error>(FinalizeRequest { final_price: args.final_price })
        })
        .transpose()?;

    let reply = choice.message.content.filter(|content| !content.trim().is_empty());

    Ok(AgentTurnResult { reply, finalize })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct FinalizeArguments {
    final_price: Decimal,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use haggle_core::{Message, Speaker};
    use rust_decimal::Decimal;

    use super::{chat_messages, turn_result_from, ChatResponse};

    fn message(speaker: Speaker, text: &str, sequence: u64) -> Message {
        Message { speaker, text: text.to_owned(), sequence, sent_at: Utc::now() }
    }

    #[test]
    fn tool_call_response_maps_to_finalize_request() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "finalize_deal",
                                "arguments": "{\"final_price\": 900}"
                            }
                        }]
                    }
                }]
            }"#,
        )
        .expect("fixture parses");

        let turn = turn_result_from(response).expect("valid tool call");
        assert_eq!(turn.finalize.expect("finalize present").final_price, Decimal::from(900));
        assert_eq!(turn.reply, None);
    }

    #[test]
    fn text_response_maps_to_reply() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": { "content": "I can do 870.", "tool_calls": null }
                }]
            }"#,
        )
        .expect("fixture parses");

        let turn = turn_result_from(response).expect("valid text reply");
        assert_eq!(turn.reply.as_deref(), Some("I can do 870."));
        assert!(turn.finalize.is_none());
    }

    #[test]
    fn unknown_tool_is_ignored_and_text_kept() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {
                        "content": "Let me check.",
                        "tool_calls": [{
                            "function": { "name": "lookup_stock", "arguments": "{}" }
                        }]
                    }
                }]
            }"#,
        )
        .expect("fixture parses");

        let turn = turn_result_from(response).expect("unknown tools ignored");
        assert!(turn.finalize.is_none());
        assert_eq!(turn.reply.as_deref(), Some("Let me check."));
    }

    #[test]
    fn malformed_finalize_arguments_surface_as_error() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "function": { "name": "finalize_deal", "arguments": "not json" }
                        }]
                    }
                }]
            }"#,
        )
        .expect("fixture parses");

        assert!(turn_result_from(response).is_err());
    }

    #[test]
    fn empty_choices_surface_as_error() {
        let response: ChatResponse =
            serde_json::from_str(r#"{ "choices": [] }"#).expect("fixture parses");
        assert!(turn_result_from(response).is_err());
    }

    #[test]
    fn replay_maps_speakers_to_chat_roles_in_order() {
        let history = vec![
            message(Speaker::Agent, "What's your offer?", 0),
            message(Speaker::Buyer, "700", 1),
            message(Speaker::Agent, "I can do 870.", 2),
        ];

        let messages = chat_messages("POLICY", &history, "ok, 880");
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[3]["role"], "assistant");
        assert_eq!(messages[4]["role"], "user");
        assert_eq!(messages[4]["content"], "ok, 880");
    }
}
