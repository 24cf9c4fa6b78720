//! Usage tracking via the UsageSink trait.
//!
//! The gateway logs all calls through a UsageSink. This decouples the gateway
//! from where accounting ends up:
//! - The CLI uses TallyUsageSink for the end-of-batch cost line
//! - TracingUsageSink emits one structured event per call

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Status of a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Record of a provider API call for logging.
#[derive(Debug, Clone)]
pub struct ProviderCallRecord {
    /// Provider name: "openai", "deepinfra", etc.
    pub provider: &'static str,
    /// Endpoint, always "chat/completions" today.
    pub endpoint: &'static str,
    /// Model used.
    pub model: String,
    /// Input tokens consumed.
    pub input_tokens: i32,
    /// Output tokens generated.
    pub output_tokens: i32,
    /// Cost in nanodollars (1e-9 USD).
    pub cost_nanodollars: i64,
    /// Completions requested (`n`).
    pub completions_requested: u32,
    /// Completions actually returned.
    pub completions_returned: u32,
    /// Batch run this request is part of (if any).
    pub job_id: Option<Uuid>,
    /// Stimulus being rated (if any).
    pub stimulus_id: Option<String>,
    /// Latency in milliseconds.
    pub latency_ms: i32,
    /// Call status.
    pub status: CallStatus,
    /// Error code if status is Error.
    pub error_code: Option<String>,
    /// Which code path made this call.
    pub caller: &'static str,
    /// When the call was made.
    pub timestamp: DateTime<Utc>,
}

impl ProviderCallRecord {
    /// Create a new record with required fields, defaulting others.
    pub fn new(
        provider: &'static str,
        endpoint: &'static str,
        model: impl Into<String>,
        caller: &'static str,
    ) -> Self {
        Self {
            provider,
            endpoint,
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            cost_nanodollars: 0,
            completions_requested: 0,
            completions_returned: 0,
            job_id: None,
            stimulus_id: None,
            latency_ms: 0,
            status: CallStatus::Success,
            error_code: None,
            caller,
            timestamp: Utc::now(),
        }
    }

    pub fn tokens(mut self, input: i32, output: i32) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    pub fn cost(mut self, nanodollars: i64) -> Self {
        self.cost_nanodollars = nanodollars;
        self
    }

    pub fn completions(mut self, requested: u32, returned: u32) -> Self {
        self.completions_requested = requested;
        self.completions_returned = returned;
        self
    }

    pub fn job(mut self, job_id: Option<Uuid>) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn stimulus(mut self, stimulus_id: Option<String>) -> Self {
        self.stimulus_id = stimulus_id;
        self
    }

    pub fn latency(mut self, ms: i32) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn error(mut self, code: impl Into<String>) -> Self {
        self.status = CallStatus::Error;
        self.error_code = Some(code.into());
        self
    }
}

/// Trait for recording provider call usage.
///
/// Implement this trait to customize where usage data is stored.
#[async_trait]
pub trait UsageSink: Send + Sync {
    /// Record a provider call. This should be fire-and-forget:
    /// failures should be logged but not propagated.
    async fn record(&self, record: ProviderCallRecord);
}

/// Usage sink that emits each call as a `tracing` event under the `usage` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    async fn record(&self, record: ProviderCallRecord) {
        tracing::debug!(
            target: "usage",
            provider = record.provider,
            model = %record.model,
            stimulus = record.stimulus_id.as_deref().unwrap_or(""),
            n = record.completions_requested,
            returned = record.completions_returned,
            tokens = record.input_tokens + record.output_tokens,
            cost_nanos = record.cost_nanodollars,
            latency_ms = record.latency_ms,
            status = record.status.as_str(),
            error_code = record.error_code.as_deref().unwrap_or(""),
            caller = record.caller,
            "provider call"
        );
    }
}

/// Running totals over every recorded call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct UsageTotals {
    pub calls: u64,
    pub failed_calls: u64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_nanodollars: i64,
}

/// Usage sink that accumulates totals and forwards each record to `tracing`.
#[derive(Debug, Default)]
pub struct TallyUsageSink {
    totals: Mutex<UsageTotals>,
}

impl TallyUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> UsageTotals {
        match self.totals.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl UsageSink for TallyUsageSink {
    async fn record(&self, record: ProviderCallRecord) {
        {
            let mut totals = match self.totals.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            totals.calls += 1;
            if record.status == CallStatus::Error {
                totals.failed_calls += 1;
            }
            totals.input_tokens += record.input_tokens as i64;
            totals.output_tokens += record.output_tokens as i64;
            totals.cost_nanodollars += record.cost_nanodollars;
        }
        TracingUsageSink.record(record).await;
    }
}
