//! LLM request executor
//!
//! Issues one generation call to the provider over one of two supported
//! wire protocols, enforces the wall-clock timeout, retries exactly once
//! on output-token truncation, and normalizes the two protocols'
//! heterogeneous response shapes into plain text. Protocol-specific field
//! names stay inside this module.

use crate::config::ProviderConfig;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::router::{Effort, ModelChoice, Protocol};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One generation call to the remote provider
///
/// Trait seam so the orchestrator can be exercised with scripted fakes
/// that never touch the network.
#[async_trait]
pub trait LlmExecutor: Send + Sync {
    /// Execute one generation call and return the extracted text
    ///
    /// `stage` names the pipeline step for error reporting.
    ///
    /// # Errors
    /// - `Provider` on non-2xx HTTP status
    /// - `Timeout` after the wall-clock budget
    /// - `EmptyResponse` on a 2xx with no extractable text
    async fn execute(
        &self,
        choice: &ModelChoice,
        system_prompt: &str,
        user_message: &str,
        stage: &'static str,
    ) -> AppResult<String>;
}

/// Outcome of a single provider round trip, before retry policy
#[derive(Debug)]
enum CallOutcome {
    Text(String),
    /// Output hit the token ceiling; carries whatever partial text the
    /// provider included
    Truncated { partial: String },
}

/// HTTP client for the provider endpoints
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    metrics: Option<Metrics>,
}

impl ProviderClient {
    /// Create a client against an explicit base URL (used by tests)
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
            metrics: None,
        }
    }

    /// Create a client from configuration, resolving the bearer credential
    ///
    /// # Errors
    /// Returns `Config` when the credential environment variable is unset.
    /// This is fatal, not retryable.
    pub fn from_config(provider: &ProviderConfig) -> AppResult<Self> {
        let api_key = provider.api_key()?;
        Ok(Self::new(
            provider.base_url(),
            api_key,
            Duration::from_secs(provider.request_timeout_seconds()),
        ))
    }

    /// Attach a metrics handle for truncation-retry accounting
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn endpoint_url(&self, protocol: Protocol) -> String {
        let base = self.base_url.trim_end_matches('/');
        match protocol {
            Protocol::Responses => format!("{}/responses", base),
            Protocol::Chat => format!("{}/chat/completions", base),
        }
    }

    /// One provider round trip with explicit token budget and effort
    async fn call_once(
        &self,
        choice: &ModelChoice,
        system_prompt: &str,
        user_message: &str,
        stage: &'static str,
        max_output_tokens: u32,
        effort: Effort,
    ) -> AppResult<CallOutcome> {
        let url = self.endpoint_url(choice.protocol);
        let body = build_request_body(choice, system_prompt, user_message, max_output_tokens, effort);

        tracing::debug!(
            stage = stage,
            model = %choice.model_id,
            protocol = choice.protocol.as_str(),
            max_output_tokens = max_output_tokens,
            "Sending provider request"
        );

        let send = async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| AppError::Provider {
                    stage,
                    status: 0,
                    message: format!("request failed: {}", e),
                })?;

            let status = response.status();
            let text = response.text().await.map_err(|e| AppError::Provider {
                stage,
                status: status.as_u16(),
                message: format!("failed to read response body: {}", e),
            })?;

            if !status.is_success() {
                return Err(AppError::Provider {
                    stage,
                    status: status.as_u16(),
                    message: truncate_for_log(&text, 300),
                });
            }

            Ok(text)
        };

        let raw = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| AppError::Timeout {
                stage,
                timeout_seconds: self.timeout.as_secs(),
            })??;

        match choice.protocol {
            Protocol::Responses => normalize_responses(&raw, stage),
            Protocol::Chat => normalize_chat(&raw, stage),
        }
    }
}

#[async_trait]
impl LlmExecutor for ProviderClient {
    async fn execute(
        &self,
        choice: &ModelChoice,
        system_prompt: &str,
        user_message: &str,
        stage: &'static str,
    ) -> AppResult<String> {
        let first = self
            .call_once(
                choice,
                system_prompt,
                user_message,
                stage,
                choice.max_output_tokens,
                choice.effort,
            )
            .await?;

        let partial = match first {
            CallOutcome::Text(text) => return Ok(text),
            CallOutcome::Truncated { partial } => partial,
        };

        // Truncation is the only retryable failure class: retry exactly
        // once with double the token budget and lowered effort. Anything
        // else fails without a second call.
        tracing::warn!(
            stage = stage,
            model = %choice.model_id,
            max_output_tokens = choice.max_output_tokens,
            partial_len = partial.len(),
            "Provider output truncated at token ceiling, retrying once with doubled budget"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_truncation_retry(stage);
        }

        let second = self
            .call_once(
                choice,
                system_prompt,
                user_message,
                stage,
                choice.max_output_tokens.saturating_mul(2),
                choice.effort.lowered(),
            )
            .await?;

        match second {
            CallOutcome::Text(text) => Ok(text),
            CallOutcome::Truncated { partial } if !partial.trim().is_empty() => {
                tracing::warn!(
                    stage = stage,
                    partial_len = partial.len(),
                    "Provider output truncated again, using partial text"
                );
                Ok(partial)
            }
            CallOutcome::Truncated { .. } => Err(AppError::EmptyResponse { stage }),
        }
    }
}

/// Protocol-specific request body
///
/// The `responses` protocol takes instructions + a single-turn input list
/// with a reasoning-effort knob; the `chat` protocol takes a system+user
/// message pair with a temperature knob.
#[derive(Serialize)]
#[serde(untagged)]
enum RequestBody {
    Responses {
        model: String,
        instructions: String,
        input: Vec<InputItem>,
        max_output_tokens: u32,
        reasoning: Reasoning,
    },
    Chat {
        model: String,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: f64,
    },
}

#[derive(Serialize)]
struct InputItem {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct Reasoning {
    effort: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

fn build_request_body(
    choice: &ModelChoice,
    system_prompt: &str,
    user_message: &str,
    max_output_tokens: u32,
    effort: Effort,
) -> RequestBody {
    match choice.protocol {
        Protocol::Responses => RequestBody::Responses {
            model: choice.model_id.clone(),
            instructions: system_prompt.to_string(),
            input: vec![InputItem {
                role: "user",
                content: user_message.to_string(),
            }],
            max_output_tokens,
            reasoning: Reasoning {
                effort: effort.as_str(),
            },
        },
        Protocol::Chat => RequestBody::Chat {
            model: choice.model_id.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_message.to_string(),
                },
            ],
            max_tokens: max_output_tokens,
            temperature: 0.7,
        },
    }
}

// ── Response normalization ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    incomplete_details: Option<IncompleteDetails>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct IncompleteDetails {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Normalize a `responses`-protocol body: walk the typed content blocks
/// and concatenate their text
fn normalize_responses(raw: &str, stage: &'static str) -> AppResult<CallOutcome> {
    let body: ResponsesBody = serde_json::from_str(raw).map_err(|e| AppError::Provider {
        stage,
        status: 200,
        message: format!("malformed responses body: {}", e),
    })?;

    let mut text = String::new();
    for item in &body.output {
        if item.kind != "message" {
            continue;
        }
        for block in &item.content {
            if block.kind == "output_text" {
                text.push_str(&block.text);
            }
        }
    }

    let truncated = body.status.as_deref() == Some("incomplete")
        && body
            .incomplete_details
            .as_ref()
            .and_then(|d| d.reason.as_deref())
            == Some("max_output_tokens");

    if truncated {
        return Ok(CallOutcome::Truncated { partial: text });
    }
    if text.trim().is_empty() {
        return Err(AppError::EmptyResponse { stage });
    }
    Ok(CallOutcome::Text(text))
}

#[derive(Deserialize)]
struct ChatBody {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    // Content can be null when the provider refuses or errors
    #[serde(default)]
    content: Option<String>,
}

/// Normalize a `chat`-protocol body: single message field
fn normalize_chat(raw: &str, stage: &'static str) -> AppResult<CallOutcome> {
    let body: ChatBody = serde_json::from_str(raw).map_err(|e| AppError::Provider {
        stage,
        status: 200,
        message: format!("malformed chat body: {}", e),
    })?;

    let text = body
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AppError::EmptyResponse { stage });
    }
    Ok(CallOutcome::Text(text.to_string()))
}

fn truncate_for_log(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}
