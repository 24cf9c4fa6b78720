//! One end-to-end run: load stimuli, rate them, write CSV, trace and manifest.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::batch::{BatchDriver, BatchSummary};
use crate::collector::RatingCollector;
use crate::config::{ConfigError, RunConfig};
use crate::gateway::{
    ChatGateway, ProviderGateway, ReasoningEffort, TallyUsageSink, UsageTotals,
};
use crate::output::{CsvOutputSink, OutputError};
use crate::scale::RatingScale;
use crate::stimulus::{Modality, SourceError};
use crate::trace::{JsonlTraceSink, TraceError, TraceSink};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),
    #[error("failed to write manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize manifest: {0}")]
    ManifestSerde(#[from] serde_json::Error),
}

/// Record of the parameters a run used and what it produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub target_count: u32,
    pub batch_size: u32,
    pub scale: RatingScale,
    pub modality: Modality,
    pub prompt_slug: String,
    pub prompt: String,
    pub stimulus_count: usize,
    pub output: PathBuf,
    pub summary: BatchSummary,
    pub usage: UsageTotals,
}

/// Execute a validated config against its provider.
pub async fn run(config: &RunConfig) -> Result<RunManifest, RunError> {
    config.validate()?;
    let usage = Arc::new(TallyUsageSink::new());
    let gateway = Arc::new(ProviderGateway::new(config.adapter()?, usage.clone()));
    run_with_gateway(config, gateway, usage).await
}

/// Same as [`run`] with a caller-supplied gateway; `usage` should be the sink
/// that gateway records into.
pub async fn run_with_gateway(
    config: &RunConfig,
    gateway: Arc<dyn ChatGateway>,
    usage: Arc<TallyUsageSink>,
) -> Result<RunManifest, RunError> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let prompt = config.resolve_prompt()?;

    let stimuli = config.source.load()?;
    info!(
        run_id = %run_id,
        stimuli = stimuli.len(),
        provider = %config.provider,
        model = %config.model,
        scale = %prompt.scale,
        "loaded stimuli"
    );

    let mut collector = RatingCollector::new(gateway, config.collector_config(Some(run_id))?);
    let trace_worker = match &config.trace {
        Some(path) => {
            let (sink, worker) = JsonlTraceSink::new(path)?;
            let sink: Arc<dyn TraceSink> = Arc::new(sink);
            collector = collector.with_trace(sink);
            Some(worker)
        }
        None => None,
    };

    let driver = BatchDriver::new(collector, Arc::new(CsvOutputSink::new(&config.output)))
        .with_concurrency(config.concurrency);
    let report = driver
        .run_batch(
            &stimuli,
            config.target_count,
            config.batch_size,
            config.throttle(),
        )
        .await;
    // The trace worker finishes once the last sender (inside the driver) is gone.
    drop(driver);
    if let Some(worker) = trace_worker {
        worker.join()?;
    }
    let report = report?;
    info!(path = %config.output.display(), rows = report.rows.len(), "wrote ratings");

    let manifest = RunManifest {
        run_id,
        started_at,
        finished_at: Utc::now(),
        provider: config.provider.to_string(),
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        reasoning_effort: config.reasoning_effort,
        target_count: config.target_count,
        batch_size: config.batch_size,
        scale: prompt.scale,
        modality: config.source.modality(),
        prompt_slug: prompt.slug,
        prompt: prompt.instructions,
        stimulus_count: stimuli.len(),
        output: config.output.clone(),
        summary: report.summary,
        usage: usage.totals(),
    };

    if let Some(path) = &config.manifest {
        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(path, json).map_err(|source| RunError::Manifest {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "wrote manifest");
    }

    Ok(manifest)
}
