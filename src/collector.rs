//! Rating collection for a single stimulus.
//!
//! The collector asks the provider for `n` completions per round trip, judges
//! each against the scale, and keeps going until it holds `target_count`
//! accepted samples. Invalid samples are discarded and logged. Transport
//! failures are retried with bounded exponential backoff; once the retry
//! budget is spent the stimulus is marked failed rather than aborting the run.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gateway::{
    Attribution, ChatGateway, ChatModel, ChatRequest, ImageDetail, ProviderError,
    ReasoningEffort,
};
use crate::prompts::{RatingPrompt, RenderOptions};
use crate::scale::SampleVerdict;
use crate::stats::describe;
use crate::stimulus::Stimulus;
use crate::trace::{now_epoch_ms, SampleTrace, TraceSink};

// =============================================================================
// Configuration
// =============================================================================

/// Bounded retry with exponential backoff for transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Consecutive failed attempts tolerated before the stimulus fails.
    pub max_retries: u32,
    #[serde(with = "duration_ms")]
    pub base_delay: Duration,
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// No retries, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait before retry number `attempt` (0-based), honoring a provider hint
    /// but never exceeding `max_delay`.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.min(16));
        let backoff = self.base_delay.saturating_mul(multiplier);
        backoff.max(hint.unwrap_or(Duration::ZERO)).min(self.max_delay)
    }
}

/// Serde helper: durations as integer milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Everything the collector needs besides the gateway.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub model: ChatModel,
    pub prompt: RatingPrompt,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub image_detail: ImageDetail,
    pub retry: RetryPolicy,
    /// Cap on answered provider calls per stimulus. `None` keeps calling
    /// until the target is reached.
    pub max_calls: Option<u32>,
    pub job_id: Option<Uuid>,
}

impl CollectorConfig {
    pub fn new(model: ChatModel, prompt: RatingPrompt) -> Self {
        Self {
            model,
            prompt,
            temperature: 1.0,
            max_tokens: Some(10),
            reasoning_effort: None,
            image_detail: ImageDetail::High,
            retry: RetryPolicy::default(),
            max_calls: None,
            job_id: None,
        }
    }
}

// =============================================================================
// Result
// =============================================================================

/// How collection for one stimulus ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// All requested samples were accepted.
    Complete,
    /// Call budget ran out with some, but not all, samples accepted.
    Incomplete,
    /// Call budget ran out without a single valid sample.
    NoValidData,
    /// Provider failure (or unreadable input) ended collection.
    Failed { error: String },
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Complete => "complete",
            Outcome::Incomplete => "incomplete",
            Outcome::NoValidData => "no_valid_data",
            Outcome::Failed { .. } => "failed",
        }
    }
}

/// Per-stimulus aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingResult {
    /// Accepted samples in arrival order.
    pub ratings: Vec<i64>,
    /// Mean rounded to 2 decimals; `None` for no data or failure.
    pub mean: Option<f64>,
    /// Sample standard deviation rounded to 2 decimals; `None` below two
    /// samples or on failure.
    pub std_dev: Option<f64>,
    pub outcome: Outcome,
    /// Provider round trips attempted, including failed ones.
    pub calls: u32,
    /// Completions discarded as unparsable or out of range.
    pub rejected: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_nanodollars: i64,
}

impl RatingResult {
    fn empty() -> Self {
        Self {
            ratings: Vec::new(),
            mean: None,
            std_dev: None,
            outcome: Outcome::NoValidData,
            calls: 0,
            rejected: 0,
            input_tokens: 0,
            output_tokens: 0,
            cost_nanodollars: 0,
        }
    }

    /// Finalize statistics for a non-failed outcome.
    fn finish(mut self, target_count: usize) -> Self {
        let (mean, std_dev) = describe(&self.ratings);
        self.mean = mean;
        self.std_dev = std_dev;
        self.outcome = if self.ratings.len() >= target_count {
            Outcome::Complete
        } else if self.ratings.is_empty() {
            Outcome::NoValidData
        } else {
            Outcome::Incomplete
        };
        self
    }

    fn fail(mut self, error: impl Into<String>) -> Self {
        self.mean = None;
        self.std_dev = None;
        self.outcome = Outcome::Failed {
            error: error.into(),
        };
        self
    }

    /// Whether this result carries a usable mean.
    pub fn is_success(&self) -> bool {
        self.mean.is_some()
    }
}

// =============================================================================
// Collector
// =============================================================================

pub struct RatingCollector {
    gateway: Arc<dyn ChatGateway>,
    config: CollectorConfig,
    trace: Option<Arc<dyn TraceSink>>,
}

impl RatingCollector {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: CollectorConfig) -> Self {
        Self {
            gateway,
            config,
            trace: None,
        }
    }

    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collect `target_count` valid ratings for one stimulus, asking for at
    /// most `batch_size` completions per provider call.
    pub async fn collect_ratings(
        &self,
        stimulus: &Stimulus,
        target_count: u32,
        batch_size: u32,
    ) -> RatingResult {
        let target = target_count as usize;
        let batch_size = batch_size.max(1);
        let scale = self.config.prompt.scale;
        let mut result = RatingResult::empty();

        let render_opts = RenderOptions {
            image_detail: self.config.image_detail,
            reasoning_model: self.config.reasoning_effort.is_some(),
        };
        let messages = match self.config.prompt.render(stimulus, render_opts) {
            Ok(m) => m,
            Err(e) => {
                warn!(stimulus = %stimulus.id, error = %e, "could not build request");
                return result.fail(e.to_string());
            }
        };

        let mut attribution = Attribution::new("collector::collect_ratings")
            .with_stimulus(stimulus.id.clone());
        if let Some(job_id) = self.config.job_id {
            attribution = attribution.with_job(job_id);
        }

        let budget = self.config.max_calls;
        let mut answered = 0u32;
        let mut consecutive_failures = 0u32;

        while result.ratings.len() < target {
            if budget.is_some_and(|max| answered >= max) {
                warn!(
                    stimulus = %stimulus.id,
                    accepted = result.ratings.len(),
                    target,
                    budget = ?budget,
                    "call budget exhausted"
                );
                break;
            }

            let want = (batch_size as usize).min(target - result.ratings.len()) as u32;
            let mut req = ChatRequest::new(
                self.config.model.clone(),
                messages.clone(),
                attribution.clone(),
            )
            .completions(want)
            .temperature(self.config.temperature);
            if let Some(max) = self.config.max_tokens {
                req = req.max_tokens(max);
            }
            if let Some(effort) = self.config.reasoning_effort {
                req = req.reasoning(effort);
            }

            let call_index = result.calls;
            result.calls += 1;

            let resp = match self.gateway.chat(req).await {
                Ok(resp) => resp,
                Err(err) => match self.on_failure(stimulus, &err, consecutive_failures) {
                    Some(delay) => {
                        consecutive_failures += 1;
                        sleep(delay).await;
                        continue;
                    }
                    None => return result.fail(err.to_string()),
                },
            };

            consecutive_failures = 0;
            answered += 1;
            result.input_tokens += resp.input_tokens as u64;
            result.output_tokens += resp.output_tokens as u64;
            result.cost_nanodollars += resp.cost_nanodollars;

            for (choice_index, completion) in resp.completions.iter().enumerate() {
                if result.ratings.len() >= target {
                    break;
                }
                let verdict = scale.judge(&completion.content);
                match &verdict {
                    SampleVerdict::Accepted(value) => {
                        debug!(stimulus = %stimulus.id, value, "rating accepted");
                        result.ratings.push(*value);
                    }
                    SampleVerdict::Rejected(reason) => {
                        warn!(
                            stimulus = %stimulus.id,
                            %reason,
                            raw = %completion.content,
                            scale = %scale,
                            "rating discarded"
                        );
                        result.rejected += 1;
                    }
                }
                self.trace_sample(stimulus, call_index, choice_index, &completion.content, verdict);
            }
        }

        let result = result.finish(target);
        info!(
            stimulus = %stimulus.id,
            collected = result.ratings.len(),
            requested = target,
            mean = ?result.mean,
            std_dev = ?result.std_dev,
            outcome = result.outcome.as_str(),
            "ratings collected"
        );
        result
    }

    /// Decide whether to retry; returns the wait before the next attempt.
    fn on_failure(
        &self,
        stimulus: &Stimulus,
        err: &ProviderError,
        consecutive_failures: u32,
    ) -> Option<Duration> {
        let retry = &self.config.retry;
        if !err.is_retryable() {
            warn!(stimulus = %stimulus.id, code = err.code(), error = %err, "provider error is not retryable");
            return None;
        }
        if consecutive_failures >= retry.max_retries {
            warn!(
                stimulus = %stimulus.id,
                code = err.code(),
                error = %err,
                attempts = consecutive_failures + 1,
                "retry budget exhausted"
            );
            return None;
        }
        let delay = retry.delay_for(consecutive_failures, err.retry_after());
        warn!(
            stimulus = %stimulus.id,
            code = err.code(),
            error = %err,
            attempt = consecutive_failures + 1,
            delay_ms = delay.as_millis() as u64,
            "provider call failed, retrying"
        );
        Some(delay)
    }

    fn trace_sample(
        &self,
        stimulus: &Stimulus,
        call_index: u32,
        choice_index: usize,
        raw: &str,
        verdict: SampleVerdict,
    ) {
        let Some(sink) = &self.trace else {
            return;
        };
        let (accepted, rejected) = match verdict {
            SampleVerdict::Accepted(v) => (Some(v), None),
            SampleVerdict::Rejected(r) => (None, Some(r)),
        };
        let event = SampleTrace {
            timestamp_ms: now_epoch_ms(),
            stimulus_id: stimulus.id.clone(),
            call_index,
            choice_index,
            model: self.config.model.model_id().to_string(),
            raw: raw.to_string(),
            accepted,
            rejected,
        };
        if let Err(e) = sink.record(event) {
            warn!(error = %e, "failed to record sample trace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::SENTIMENT_PROMPT;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
        };
        assert_eq!(policy.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4, None), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(40, None), Duration::from_millis(1_000));
    }

    #[test]
    fn backoff_honors_hint_within_cap() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(60))),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn calls_are_uncapped_by_default() {
        let cfg = CollectorConfig::new(ChatModel::openai("gpt-4.1"), SENTIMENT_PROMPT.to_prompt());
        assert_eq!(cfg.max_calls, None);
    }

    #[test]
    fn retry_policy_deserializes_millis() {
        let p: RetryPolicy =
            serde_json::from_str(r#"{"max_retries": 2, "base_delay": 250}"#).unwrap();
        assert_eq!(p.max_retries, 2);
        assert_eq!(p.base_delay, Duration::from_millis(250));
        assert_eq!(p.max_delay, Duration::from_secs(60));
    }
}
