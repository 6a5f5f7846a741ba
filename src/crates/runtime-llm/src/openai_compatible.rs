//! HTTP backend for any provider exposing an OpenAI-compatible
//! `/chat/completions` endpoint (OpenAI itself, LM Studio, OpenRouter,
//! vLLM's OpenAI-compat mode). Grounded on the teacher's
//! `remote/openai.rs` `OpenAiClient`: same request/response wire shapes,
//! same header and status-code handling, generalized from
//! `langgraph_core::llm::ChatModel` to the narrower `LlmClient::generate`
//! contract this runtime calls through.

use async_trait::async_trait;
use runtime_core::{GenerateResult, LlmClient, LlmError, Message, Role, ToolCallRequest, ToolDef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RemoteLlmConfig;
use crate::error::ProviderError;

pub struct OpenAiCompatibleClient {
    config: RemoteLlmConfig,
    http: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: RemoteLlmConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Http)?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn generate(&self, messages: &[Message], tools: &[ToolDef]) -> Result<GenerateResult, LlmError> {
        self.generate_inner(messages, tools).await.map_err(LlmError::from)
    }
}

impl OpenAiCompatibleClient {
    async fn generate_inner(&self, messages: &[Message], tools: &[ToolDef]) -> Result<GenerateResult, ProviderError> {
        let body = WireRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(to_wire_message).collect(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(to_wire_tool).collect())
            },
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Authentication(response.text().await.unwrap_or_default()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(response.text().await.unwrap_or_default()));
        }
        if !status.is_success() {
            return Err(ProviderError::Provider(format!(
                "{status}: {}",
                response.text().await.unwrap_or_default()
            )));
        }

        let parsed: WireResponse = response.json().await?;
        from_wire_response(parsed)
    }
}

fn to_wire_message(msg: &Message) -> WireMessage {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    WireMessage {
        role: role.to_string(),
        content: Some(msg.content.clone()),
        tool_call_id: msg.tool_call_id.clone(),
    }
}

fn to_wire_tool(def: &ToolDef) -> WireTool {
    WireTool {
        kind: "function".to_string(),
        function: WireFunction {
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: def.parameters.clone(),
        },
    }
}

fn from_wire_response(response: WireResponse) -> Result<GenerateResult, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| ToolCallRequest {
            call_id: c.id,
            name: c.function.name,
            args: serde_json::from_str(&c.function.arguments).unwrap_or(Value::Null),
        })
        .collect::<Vec<_>>();

    let final_text = choice.message.content;

    Ok(GenerateResult {
        deltas: final_text.clone().into_iter().collect(),
        tool_calls,
        final_text,
    })
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct WireToolCallFunction {
    name: String,
    arguments: String,
}
