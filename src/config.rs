//! Run configuration.
//!
//! A run is described by one JSON file. Secrets never live in it; API keys are
//! read from the environment when the adapter is built.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collector::{CollectorConfig, RetryPolicy};
use crate::gateway::openai::OpenAiCompatibleAdapter;
use crate::gateway::{ChatModel, ImageDetail, Provider, ProviderError, ReasoningEffort};
use crate::prompts::{preset_by_slug, RatingPrompt};
use crate::scale::RatingScale;
use crate::stimulus::SourceSpec;

/// Overrides the provider's own key variable for every provider.
pub const API_KEY_OVERRIDE_ENV: &str = "RATING_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("unknown prompt preset '{0}'")]
    UnknownPreset(String),
    #[error("{var} not set")]
    MissingApiKey { var: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Which prompt to rate with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptSpec {
    /// A built-in prompt; `scale` replaces the preset's scale when given.
    Preset {
        name: String,
        #[serde(default)]
        scale: Option<RatingScale>,
        #[serde(default)]
        system: Option<String>,
    },
    Custom {
        instructions: String,
        scale: RatingScale,
        #[serde(default)]
        system: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub provider: Provider,
    pub model: String,
    /// Endpoint override; required for the `custom` provider.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable to read the API key from instead of the default.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub prompt: PromptSpec,
    #[serde(default)]
    pub image_detail: ImageDetail,
    #[serde(default = "default_count")]
    pub target_count: u32,
    #[serde(default = "default_count")]
    pub batch_size: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,
    /// Set for reasoning models; switches the request to
    /// `max_completion_tokens` and drops temperature.
    #[serde(default)]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub max_calls: Option<u32>,
    pub source: SourceSpec,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub trace: Option<PathBuf>,
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_count() -> u32 {
    25
}

fn default_temperature() -> f32 {
    1.0
}

fn default_max_tokens() -> Option<u32> {
    Some(10)
}

fn default_throttle_ms() -> u64 {
    1_000
}

fn default_concurrency() -> usize {
    1
}

fn default_output() -> PathBuf {
    PathBuf::from("ratings.csv")
}

impl RunConfig {
    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RunConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must be non-empty".into()));
        }
        if self.target_count == 0 {
            return Err(ConfigError::Invalid("target_count must be >= 1".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be >= 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be >= 1".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.max_calls == Some(0) {
            return Err(ConfigError::Invalid("max_calls must be >= 1".into()));
        }
        if self.provider == Provider::Custom && self.base_url.is_none() {
            return Err(ConfigError::Invalid(
                "provider 'custom' needs base_url".into(),
            ));
        }
        self.resolve_prompt().map(|_| ())
    }

    /// Resolve the prompt and check its scale.
    pub fn resolve_prompt(&self) -> Result<RatingPrompt, ConfigError> {
        let (prompt, system) = match &self.prompt {
            PromptSpec::Preset {
                name,
                scale,
                system,
            } => {
                let preset =
                    preset_by_slug(name).ok_or_else(|| ConfigError::UnknownPreset(name.clone()))?;
                let mut prompt = preset.to_prompt();
                if let Some(scale) = scale {
                    prompt.scale = *scale;
                }
                (prompt, system)
            }
            PromptSpec::Custom {
                instructions,
                scale,
                system,
            } => {
                if instructions.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "custom prompt instructions must be non-empty".into(),
                    ));
                }
                (RatingPrompt::custom(instructions.clone(), *scale), system)
            }
        };
        if prompt.scale.min > prompt.scale.max {
            return Err(ConfigError::Invalid(format!(
                "scale min {} exceeds max {}",
                prompt.scale.min, prompt.scale.max
            )));
        }
        Ok(match system {
            Some(system) => prompt.with_system(system.clone()),
            None => prompt,
        })
    }

    pub fn chat_model(&self) -> ChatModel {
        ChatModel::new(self.provider, self.model.clone())
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Environment variable the API key is read from.
    pub fn api_key_var(&self) -> String {
        match &self.api_key_env {
            Some(var) => var.clone(),
            None if std::env::var_os(API_KEY_OVERRIDE_ENV).is_some() => {
                API_KEY_OVERRIDE_ENV.to_string()
            }
            None => self.provider.api_key_env().to_string(),
        }
    }

    /// Build the HTTP adapter, reading the API key from the environment.
    pub fn adapter(&self) -> Result<OpenAiCompatibleAdapter, ConfigError> {
        let var = self.api_key_var();
        let api_key = std::env::var(&var).map_err(|_| ConfigError::MissingApiKey { var })?;
        let base_url = self
            .base_url
            .clone()
            .or_else(|| self.provider.default_base_url().map(str::to_string))
            .ok_or_else(|| {
                ConfigError::Invalid(format!("provider '{}' needs base_url", self.provider))
            })?;
        Ok(OpenAiCompatibleAdapter::with_config(
            self.provider,
            api_key,
            base_url,
            Duration::from_secs(self.timeout_secs),
        )?)
    }

    pub fn collector_config(&self, job_id: Option<Uuid>) -> Result<CollectorConfig, ConfigError> {
        let mut config = CollectorConfig::new(self.chat_model(), self.resolve_prompt()?);
        config.temperature = self.temperature;
        config.max_tokens = self.max_tokens;
        config.reasoning_effort = self.reasoning_effort;
        config.image_detail = self.image_detail;
        config.retry = self.retry;
        config.max_calls = self.max_calls;
        config.job_id = job_id;
        Ok(config)
    }
}
