//! Core types for the provider gateway.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

// =============================================================================
// ATTRIBUTION
// =============================================================================

/// Attribution for cost tracking and debugging.
///
/// Every request through the gateway carries attribution so usage records can
/// be tied back to:
/// - The batch run it belongs to (job_id)
/// - The stimulus being rated (stimulus_id)
/// - Which code path triggered it (caller)
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    /// Batch run this request is part of.
    pub job_id: Option<Uuid>,
    /// Identifier of the stimulus being rated, if any.
    pub stimulus_id: Option<String>,
    /// Which code path made this call, for debugging.
    /// Use a static string like "collector::rate" or "cli::run".
    pub caller: &'static str,
}

impl Attribution {
    pub fn new(caller: &'static str) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    pub fn with_job(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_stimulus(mut self, stimulus_id: impl Into<String>) -> Self {
        self.stimulus_id = Some(stimulus_id.into());
        self
    }
}

// =============================================================================
// PROVIDERS
// =============================================================================

/// Hosted OpenAI-compatible chat completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    DeepInfra,
    OpenRouter,
    /// Any other OpenAI-compatible endpoint; needs an explicit base URL.
    Custom,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::DeepInfra,
        Provider::OpenRouter,
        Provider::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::DeepInfra => "deepinfra",
            Provider::OpenRouter => "openrouter",
            Provider::Custom => "custom",
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("https://api.openai.com/v1"),
            Provider::DeepInfra => Some("https://api.deepinfra.com/v1/openai"),
            Provider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Provider::Custom => None,
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::DeepInfra => "DEEPINFRA_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::Custom => "RATING_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CHAT TYPES
// =============================================================================

/// Chat message role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    /// System-level instructions for reasoning models.
    Developer,
    User,
    Assistant,
}

/// Resolution hint for image inputs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    #[default]
    High,
    Auto,
}

/// One part of a multimodal user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Remote URL or `data:` URI.
    ImageUrl { url: String, detail: ImageDetail },
}

/// Message body: plain text or a list of content parts.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Characters of text plus image URL length; used for input size limits.
    pub fn char_len(&self) -> usize {
        match self {
            MessageContent::Text(t) => t.len(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text(t) => t.len(),
                    ContentPart::ImageUrl { url, .. } => url.len(),
                })
                .sum(),
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn developer(content: impl Into<String>) -> Self {
        Self {
            role: Role::Developer,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Chat model specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatModel {
    provider: Provider,
    id: String,
}

impl ChatModel {
    pub fn new(provider: Provider, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            id: model_id.into(),
        }
    }

    pub fn openai(model_id: impl Into<String>) -> Self {
        Self::new(Provider::OpenAi, model_id)
    }

    pub fn deepinfra(model_id: impl Into<String>) -> Self {
        Self::new(Provider::DeepInfra, model_id)
    }

    pub fn openrouter(model_id: impl Into<String>) -> Self {
        Self::new(Provider::OpenRouter, model_id)
    }

    pub fn model_id(&self) -> &str {
        &self.id
    }

    pub fn provider(&self) -> &'static str {
        self.provider.as_str()
    }
}

/// Reasoning depth for reasoning models (GPT-5 family).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

/// Request for chat completion.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model to use.
    pub model: ChatModel,
    /// Messages in the conversation.
    pub messages: Vec<Message>,
    /// Number of independent completions to generate in one round trip.
    pub n: u32,
    /// Sampling temperature (0.0 - 2.0). Not sent to reasoning models.
    pub temperature: f32,
    /// Maximum tokens to generate per completion.
    ///
    /// Sent as `max_tokens`, or `max_completion_tokens` when a reasoning
    /// effort is set.
    pub max_tokens: Option<u32>,
    /// Reasoning effort; marks the request as targeting a reasoning model.
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Attribution for cost tracking.
    pub attribution: Attribution,
}

impl ChatRequest {
    pub fn new(model: ChatModel, messages: Vec<Message>, attribution: Attribution) -> Self {
        Self {
            model,
            messages,
            n: 1,
            temperature: 1.0,
            max_tokens: None,
            reasoning_effort: None,
            attribution,
        }
    }

    pub fn completions(mut self, n: u32) -> Self {
        self.n = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn reasoning(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Unknown(String),
}

impl From<Option<String>> for FinishReason {
    fn from(s: Option<String>) -> Self {
        match s.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some(other) => FinishReason::Unknown(other.to_string()),
            None => FinishReason::Unknown("none".to_string()),
        }
    }
}

/// One independent completion from a multi-completion response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Generated text, possibly empty.
    pub content: String,
    /// Why the model stopped.
    pub finish_reason: FinishReason,
}

impl Completion {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: FinishReason::Stop,
        }
    }
}

/// Response from chat completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Completions in the order the provider returned them.
    pub completions: Vec<Completion>,
    /// Input tokens consumed.
    pub input_tokens: u32,
    /// Output tokens generated across all completions.
    pub output_tokens: u32,
    /// Cost in nanodollars.
    pub cost_nanodollars: i64,
    /// Time taken for the request.
    pub latency: Duration,
}

impl ChatResponse {
    /// Response carrying only the given texts, with zeroed usage.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            completions: texts.into_iter().map(Completion::new).collect(),
            input_tokens: 0,
            output_tokens: 0,
            cost_nanodollars: 0,
            latency: Duration::ZERO,
        }
    }

    pub(crate) fn empty() -> Self {
        Self::from_texts(Vec::<String>::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_defaults_cover_known_hosts() {
        assert_eq!(
            Provider::DeepInfra.default_base_url(),
            Some("https://api.deepinfra.com/v1/openai")
        );
        assert_eq!(Provider::Custom.default_base_url(), None);
        assert_eq!(Provider::OpenRouter.api_key_env(), "OPENROUTER_API_KEY");
    }

    #[test]
    fn completions_never_drops_below_one() {
        let req = ChatRequest::new(
            ChatModel::openai("gpt-4.1-2025-04-14"),
            vec![Message::user("hi")],
            Attribution::new("test"),
        )
        .completions(0);
        assert_eq!(req.n, 1);
    }

    #[test]
    fn content_char_len_counts_text_and_urls() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text("abcd".into()),
            ContentPart::ImageUrl {
                url: "https://x/y.png".into(),
                detail: ImageDetail::High,
            },
        ]);
        assert_eq!(content.char_len(), 4 + "https://x/y.png".len());
    }
}
