//! OpenRouter chat-completions transport.
//!
//! The driver treats this as an opaque request/response channel: messages
//! and tool schemas in, content / reasoning / tool calls out. Transport
//! failures (timeouts, non-2xx, malformed envelopes) are retried here with
//! exponential backoff; once the budget is exhausted the error surfaces to
//! the driver, which converts it into a forced action.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;

const LOG_TARGET: &str = "llm::adapter";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{API_KEY_ENV} not found in environment")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(String),
    #[error("call failed after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: String },
}

/// Settings for model reasoning/thinking capabilities.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReasoningSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub effort: Option<String>, // "low" | "medium" | "high" | "xhigh"
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub include_reasoning: bool,
    /// Echo `reasoning_details` back on subsequent turns (required by some
    /// providers, e.g. Gemini).
    #[serde(default = "default_true")]
    pub preserve_blocks: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            effort: None,
            max_tokens: None,
            include_reasoning: false,
            preserve_blocks: true,
        }
    }
}

/// OpenRouter provider routing preferences.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_fallbacks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_parameters: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_collection: Option<String>, // "allow" | "deny"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantizations: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_multiplier: f64,
    pub request_timeout: Duration,
    pub reasoning: ReasoningSettings,
    pub provider: Option<ProviderSettings>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            retry_multiplier: 2.0,
            request_timeout: Duration::from_secs(120),
            reasoning: ReasoningSettings::default(),
            provider: None,
        }
    }
}

/// One chat message in the OpenRouter wire format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_details: Option<Value>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            reasoning_details: None,
        }
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            reasoning_details: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

/// Response from a single model call.
#[derive(Clone, Debug, Serialize)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
    pub reasoning_details: Option<Value>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
    pub model: String,
    pub provider: Option<String>,
    pub latency_ms: f64,
}

/// The seam the driver consumes: messages and tool schemas in, one model
/// response out. `LlmClient` is the production implementation; tests
/// substitute scripted transports.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    fn model(&self) -> &str;
    fn preserve_reasoning_blocks(&self) -> bool;
    async fn call(
        &self,
        messages: &[ChatMessage],
        tools: Option<&Value>,
    ) -> Result<LlmResponse, TransportError>;
}

/// A reqwest-backed OpenRouter client bound to one model configuration.
#[derive(Clone, Debug)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, TransportError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| TransportError::MissingApiKey)?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: LlmConfig, api_key: String) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            config,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn request_body(&self, messages: &[ChatMessage], tools: Option<&Value>) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        if let Some(tools) = tools {
            body["tools"] = tools.clone();
            body["tool_choice"] = json!("auto");
        }
        if self.config.reasoning.enabled {
            let mut reasoning = serde_json::Map::new();
            if let Some(effort) = &self.config.reasoning.effort {
                reasoning.insert("effort".into(), json!(effort));
            }
            if let Some(max_tokens) = self.config.reasoning.max_tokens {
                reasoning.insert("max_tokens".into(), json!(max_tokens));
            }
            if !reasoning.is_empty() {
                body["reasoning"] = Value::Object(reasoning);
            }
            if self.config.reasoning.include_reasoning {
                body["include_reasoning"] = json!(true);
            }
        }
        if let Some(provider) = &self.config.provider {
            if let Ok(value) = serde_json::to_value(provider) {
                if value.as_object().map(|o| !o.is_empty()).unwrap_or(false) {
                    body["provider"] = value;
                }
            }
        }
        body
    }

    /// One model call with transport-level retry. Any non-2xx status or
    /// network failure counts as a retryable attempt.
    pub async fn call(
        &self,
        messages: &[ChatMessage],
        tools: Option<&Value>,
    ) -> Result<LlmResponse, TransportError> {
        let body = self.request_body(messages, tools);
        let mut delay = self.config.retry_delay;
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_retries {
            let started = Instant::now();
            match self.call_inner(&body).await {
                Ok(mut response) => {
                    response.latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                    return Ok(response);
                }
                Err(err) => {
                    last_error = err.to_string();
                    tracing::warn!(
                        target: LOG_TARGET,
                        model = %self.config.model,
                        attempt,
                        error = %last_error,
                        "model call failed"
                    );
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(delay).await;
                        delay = delay.mul_f64(self.config.retry_multiplier);
                    }
                }
            }
        }

        Err(TransportError::ExhaustedRetries {
            attempts: self.config.max_retries,
            last: last_error,
        })
    }

    async fn call_inner(&self, body: &Value) -> Result<LlmResponse, TransportError> {
        let response = self
            .http
            .post(OPENROUTER_URL)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Value = response.json().await?;
        parse_envelope(&self.config.model, envelope)
    }
}

#[async_trait::async_trait]
impl ChatTransport for LlmClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn preserve_reasoning_blocks(&self) -> bool {
        self.config.reasoning.preserve_blocks
    }

    async fn call(
        &self,
        messages: &[ChatMessage],
        tools: Option<&Value>,
    ) -> Result<LlmResponse, TransportError> {
        LlmClient::call(self, messages, tools).await
    }
}

fn parse_envelope(model: &str, envelope: Value) -> Result<LlmResponse, TransportError> {
    let choice = envelope
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| TransportError::MalformedEnvelope("missing choices[0]".into()))?;
    let message = choice
        .get("message")
        .ok_or_else(|| TransportError::MalformedEnvelope("missing choices[0].message".into()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);
    let reasoning_content = message
        .get("reasoning_content")
        .or_else(|| message.get("reasoning"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let reasoning_details = message
        .get("reasoning_details")
        .filter(|v| !v.is_null())
        .cloned();
    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| TransportError::MalformedEnvelope(format!("bad tool_calls: {e}")))?
        .unwrap_or_default();
    let usage: Usage = envelope
        .get("usage")
        .map(|v| serde_json::from_value(v.clone()).unwrap_or_default())
        .unwrap_or_default();
    let provider = envelope
        .get("provider")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(LlmResponse {
        content,
        reasoning_content,
        reasoning_details,
        tool_calls,
        usage,
        model: model.to_string(),
        provider,
        latency_ms: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_envelope_extracts_content_and_usage() {
        let envelope = json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12},
            "provider": "openai",
        });
        let response = parse_envelope("test/model", envelope).unwrap();
        assert_eq!(response.content.as_deref(), Some("hello"));
        assert_eq!(response.usage.total_tokens, 12);
        assert_eq!(response.provider.as_deref(), Some("openai"));
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn parse_envelope_extracts_tool_calls() {
        let envelope = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "recall_my_hands", "arguments": "{\"limit\": 5}"}
                }]
            }}],
        });
        let response = parse_envelope("test/model", envelope).unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].function.name, "recall_my_hands");
    }

    #[test]
    fn parse_envelope_falls_back_to_reasoning_channel() {
        let envelope = json!({
            "choices": [{"message": {
                "content": null,
                "reasoning": "{\"action\": \"fold\"}",
            }}],
        });
        let response = parse_envelope("test/model", envelope).unwrap();
        assert!(response.content.is_none());
        assert_eq!(
            response.reasoning_content.as_deref(),
            Some("{\"action\": \"fold\"}")
        );
    }

    #[test]
    fn parse_envelope_rejects_missing_choices() {
        assert!(matches!(
            parse_envelope("m", json!({})),
            Err(TransportError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn request_body_carries_reasoning_and_provider_preferences() {
        let config = LlmConfig {
            reasoning: ReasoningSettings {
                enabled: true,
                effort: Some("high".into()),
                max_tokens: Some(512),
                include_reasoning: true,
                preserve_blocks: true,
            },
            provider: Some(ProviderSettings {
                order: Some(vec!["anthropic".into()]),
                data_collection: Some("deny".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let client = LlmClient::with_api_key(config, "test-key".into()).unwrap();
        let body = client.request_body(&[ChatMessage::user("hi")], None);
        assert_eq!(body["reasoning"]["effort"], "high");
        assert_eq!(body["include_reasoning"], true);
        assert_eq!(body["provider"]["order"][0], "anthropic");
        assert_eq!(body["provider"]["data_collection"], "deny");
        assert!(body.get("tools").is_none());
    }
}
