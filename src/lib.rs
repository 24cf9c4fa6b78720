#![forbid(unsafe_code)]

//! # rating-harness
//!
//! Repeated numeric ratings of images and text from hosted LLMs.
//!
//! Each stimulus is rated many times by asking an OpenAI-compatible endpoint
//! for several completions per call (`n`). Answers that are not bare integers
//! inside the scale are discarded and replaced by further calls until the
//! target count is reached. The accepted samples are reduced to a mean and a
//! sample standard deviation, one CSV row per stimulus.

pub mod batch;
pub mod collector;
pub mod config;
pub mod gateway;
pub mod output;
pub mod prompts;
pub mod run;
pub mod scale;
pub mod stats;
pub mod stimulus;
pub mod trace;

pub use batch::{BatchDriver, BatchReport, BatchSummary};
pub use collector::{CollectorConfig, Outcome, RatingCollector, RatingResult, RetryPolicy};
pub use config::{ConfigError, PromptSpec, RunConfig};
pub use gateway::{Attribution, ChatGateway, ProviderGateway, UsageSink};
pub use output::{CsvOutputSink, OutputError, OutputSink, ResultRow};
pub use prompts::{RatingPrompt, PRESETS};
pub use run::{run, run_with_gateway, RunError, RunManifest};
pub use scale::{RatingScale, RejectReason, SampleVerdict};
pub use stimulus::{Modality, Payload, SourceError, SourceSpec, Stimulus};
pub use trace::{JsonlTraceSink, SampleTrace, TraceError, TraceSink, TraceWorker};
