//! OpenAI-compatible adapter for chat completions.
//!
//! Speaks the `/chat/completions` dialect shared by OpenAI, DeepInfra,
//! OpenRouter and most self-hosted servers, including `n` repeated
//! completions and image content parts.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::{ErrorContext, ProviderError};
use super::pricing::chat_cost;
use super::types::*;

// =============================================================================
// TRAIT
// =============================================================================

/// Trait for chat completion providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Maximum allowed response body length (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed input characters, counting inline image data.
///
/// Base64 data URIs for local images dominate this; 20MB covers the largest
/// images providers accept.
const MAX_INPUT_CHARS: usize = 20 * 1_024 * 1_024;

/// Wait suggested for a 429 without a usable `retry-after` header.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Adapter for any OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleAdapter {
    client: reqwest::Client,
    base_url: String,
    provider: Provider,
}

impl OpenAiCompatibleAdapter {
    /// Create with custom configuration.
    pub fn with_config(
        provider: Provider,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ProviderError::config("Invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        // OpenRouter attributes traffic to an app when these are present.
        if provider == Provider::OpenRouter {
            if let Ok(r) = std::env::var("OPENROUTER_REFERER") {
                if let Ok(v) = HeaderValue::from_str(&r) {
                    headers.insert("HTTP-Referer", v);
                }
            }
            if let Ok(t) = std::env::var("OPENROUTER_APP_TITLE") {
                if let Ok(v) = HeaderValue::from_str(&t) {
                    headers.insert("X-Title", v);
                }
            }
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            provider,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Extract request ID from response headers.
    fn extract_request_id(headers: &HeaderMap) -> Option<String> {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    fn extract_retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Check if message indicates a refusal.
    fn is_refusal(msg: &str) -> bool {
        let l = msg.trim_start().to_lowercase();
        let first_line = l.lines().next().unwrap_or("");

        const PREFIXES: &[&str] = &[
            "refus",
            "i cannot",
            "i can't",
            "i won't",
            "i will not",
            "i am unable to",
            "i'm unable to",
            "unable to comply",
            "unable to assist",
        ];

        PREFIXES.iter().any(|p| first_line.starts_with(p)) || l.contains("request was refused")
    }

    fn provider_name(&self) -> &'static str {
        self.provider.as_str()
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'static str>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: ApiContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ApiContent<'a> {
    Text(&'a str),
    Parts(Vec<ApiPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ApiImageUrl<'a> },
}

#[derive(Serialize)]
struct ApiImageUrl<'a> {
    url: &'a str,
    detail: ImageDetail,
}

impl<'a> From<&'a Message> for ApiMessage<'a> {
    fn from(m: &'a Message) -> Self {
        let role = match m.role {
            Role::System => "system",
            Role::Developer => "developer",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let content = match &m.content {
            MessageContent::Text(t) => ApiContent::Text(t),
            MessageContent::Parts(parts) => ApiContent::Parts(
                parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text(text) => ApiPart::Text { text },
                        ContentPart::ImageUrl { url, detail } => ApiPart::ImageUrl {
                            image_url: ApiImageUrl {
                                url,
                                detail: *detail,
                            },
                        },
                    })
                    .collect(),
            ),
        };
        Self { role, content }
    }
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    code: Option<serde_json::Value>,
}

impl ApiError {
    fn code_string(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}

// =============================================================================
// CHAT PROVIDER IMPL
// =============================================================================

#[async_trait]
impl ChatProvider for OpenAiCompatibleAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let total_chars: usize = req.messages.iter().map(|m| m.content.char_len()).sum();

        if total_chars > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "Input too large: {total_chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }

        let start = Instant::now();

        let reasoning = req.reasoning_effort.is_some();
        let api_req = ChatApiRequest {
            model: req.model.model_id(),
            messages: req.messages.iter().map(ApiMessage::from).collect(),
            n: req.n,
            temperature: if reasoning {
                None
            } else {
                Some(req.temperature)
            },
            max_tokens: if reasoning { None } else { req.max_tokens },
            max_completion_tokens: if reasoning { req.max_tokens } else { None },
            reasoning_effort: req.reasoning_effort.map(|e| e.as_str()),
        };

        let mut response = self
            .client
            .post(self.chat_url())
            .json(&api_req)
            .send()
            .await?;

        let status = response.status();
        let request_id = Self::extract_request_id(response.headers());
        let retry_after = Self::extract_retry_after(response.headers());

        // Stream response to enforce size limit
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(ProviderError::provider(
                    self.provider_name(),
                    format!("Response too large: {new_len} bytes"),
                    false,
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = String::from_utf8_lossy(&bytes).to_string();

        let ctx = ErrorContext::new().with_status(status.as_u16());
        let ctx = if let Some(id) = &request_id {
            ctx.with_request_id(id)
        } else {
            ctx
        };

        if !status.is_success() {
            let mut message = format!("HTTP {}", status.as_u16());
            let mut ctx = ctx;
            if let Ok(parsed) = serde_json::from_str::<ChatApiResponse>(&body) {
                if let Some(error) = parsed.error {
                    if let Some(code) = error.code_string() {
                        ctx = ctx.with_code(code);
                    }
                    if let Some(m) = error.message.filter(|m| !m.is_empty()) {
                        message = m;
                    }
                }
            }

            return Err(match status.as_u16() {
                429 => ProviderError::rate_limited(
                    retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT),
                    ctx,
                ),
                400 | 404 | 413 | 422 => ProviderError::InvalidRequest {
                    message,
                    context: Some(ctx),
                },
                s => ProviderError::provider_with_context(
                    self.provider_name(),
                    message,
                    s >= 500 || s == 408,
                    ctx,
                ),
            });
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::provider(self.provider_name(), format!("Invalid JSON: {e}"), true)
        })?;

        // Check for API-level error on a 200
        if let Some(error) = parsed.error {
            let message = error.message.unwrap_or_default();
            if Self::is_refusal(&message) {
                return Err(ProviderError::refused(message));
            }
            return Err(ProviderError::provider(self.provider_name(), message, false));
        }

        let choices = parsed.choices.unwrap_or_default();
        if choices.is_empty() {
            return Err(ProviderError::provider(
                self.provider_name(),
                "No choices in response",
                true,
            ));
        }

        let completions: Vec<Completion> = choices
            .into_iter()
            .map(|choice| {
                let content = choice
                    .message
                    .and_then(|m| m.content)
                    .unwrap_or_default();
                Completion {
                    content,
                    finish_reason: FinishReason::from(choice.finish_reason),
                }
            })
            .collect();

        let (input_tokens, output_tokens) = match parsed.usage {
            Some(usage) => (
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
            ),
            None => {
                warn!(
                    provider = self.provider_name(),
                    model = req.model.model_id(),
                    "response carried no usage block; recording zero tokens"
                );
                (0, 0)
            }
        };

        let latency = start.elapsed();
        let cost = chat_cost(req.model.model_id(), input_tokens, output_tokens);

        Ok(ChatResponse {
            completions,
            input_tokens,
            output_tokens,
            cost_nanodollars: cost,
            latency,
        })
    }
}
