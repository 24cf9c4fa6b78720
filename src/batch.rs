//! Batch driver: one pass over the stimuli, one row per stimulus.
//!
//! Per-stimulus failures never escape as errors; they become rows with an
//! error marker. Rows are persisted once, after the last stimulus.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info};

use crate::collector::{Outcome, RatingCollector};
use crate::gateway::pricing::nanos_to_usd;
use crate::output::{OutputError, OutputSink, ResultRow};
use crate::stats::{summarize_means, MeanSummary};
use crate::stimulus::Stimulus;

/// End-of-batch statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub stimuli: usize,
    /// Rows with a mean (complete or incomplete).
    pub successful: usize,
    pub failed: usize,
    pub no_valid_data: usize,
    /// Over per-stimulus means of successful rows only.
    pub means: Option<MeanSummary>,
    pub provider_calls: u64,
    pub cost_nanodollars: i64,
}

impl BatchSummary {
    pub fn from_rows(rows: &[ResultRow]) -> Self {
        let means: Vec<f64> = rows.iter().filter_map(|r| r.result.mean).collect();
        Self {
            stimuli: rows.len(),
            successful: means.len(),
            failed: rows
                .iter()
                .filter(|r| matches!(r.result.outcome, Outcome::Failed { .. }))
                .count(),
            no_valid_data: rows
                .iter()
                .filter(|r| r.result.outcome == Outcome::NoValidData)
                .count(),
            means: summarize_means(&means),
            provider_calls: rows.iter().map(|r| r.result.calls as u64).sum(),
            cost_nanodollars: rows.iter().map(|r| r.result.cost_nanodollars).sum(),
        }
    }
}

/// Rows in input order plus their summary.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub rows: Vec<ResultRow>,
    pub summary: BatchSummary,
}

pub struct BatchDriver {
    collector: RatingCollector,
    sink: Arc<dyn OutputSink>,
    concurrency: usize,
}

impl BatchDriver {
    pub fn new(collector: RatingCollector, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            collector,
            sink,
            concurrency: 1,
        }
    }

    /// Rate up to `n` stimuli at once. Output order still follows input order.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Rate every stimulus, persist the rows once, and summarize.
    ///
    /// `throttle` is the pause between consecutive stimuli; with concurrency
    /// above one it applies per worker slot.
    pub async fn run_batch(
        &self,
        stimuli: &[Stimulus],
        target_count: u32,
        batch_size: u32,
        throttle: Duration,
    ) -> Result<BatchReport, OutputError> {
        info!(
            stimuli = stimuli.len(),
            target_count,
            batch_size,
            concurrency = self.concurrency,
            "starting batch"
        );

        let rows = if self.concurrency <= 1 {
            self.run_sequential(stimuli, target_count, batch_size, throttle)
                .await
        } else {
            self.run_buffered(stimuli, target_count, batch_size, throttle)
                .await
        };

        self.sink.write_rows(&rows)?;

        let summary = BatchSummary::from_rows(&rows);
        log_summary(&summary);
        Ok(BatchReport { rows, summary })
    }

    async fn run_sequential(
        &self,
        stimuli: &[Stimulus],
        target_count: u32,
        batch_size: u32,
        throttle: Duration,
    ) -> Vec<ResultRow> {
        let total = stimuli.len();
        let mut rows = Vec::with_capacity(total);
        for (index, stimulus) in stimuli.iter().enumerate() {
            rows.push(
                self.rate_one(index, total, stimulus, target_count, batch_size)
                    .await,
            );
            if index + 1 < total && !throttle.is_zero() {
                sleep(throttle).await;
            }
        }
        rows
    }

    async fn run_buffered(
        &self,
        stimuli: &[Stimulus],
        target_count: u32,
        batch_size: u32,
        throttle: Duration,
    ) -> Vec<ResultRow> {
        let total = stimuli.len();
        stream::iter(stimuli.iter().enumerate())
            .map(|(index, stimulus)| async move {
                let row = self
                    .rate_one(index, total, stimulus, target_count, batch_size)
                    .await;
                if index + 1 < total && !throttle.is_zero() {
                    sleep(throttle).await;
                }
                row
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn rate_one(
        &self,
        index: usize,
        total: usize,
        stimulus: &Stimulus,
        target_count: u32,
        batch_size: u32,
    ) -> ResultRow {
        info!("Processing {}/{}: {}", index + 1, total, stimulus.id);
        let result = self
            .collector
            .collect_ratings(stimulus, target_count, batch_size)
            .await;
        if let Outcome::Failed { error } = &result.outcome {
            error!(stimulus = %stimulus.id, %error, "stimulus failed");
        }
        ResultRow::new(stimulus, result)
    }
}

fn log_summary(summary: &BatchSummary) {
    info!(
        "Summary: {}/{} stimuli rated successfully ({} failed, {} without valid data)",
        summary.successful, summary.stimuli, summary.failed, summary.no_valid_data
    );
    if let Some(means) = &summary.means {
        info!(
            "Average rating across stimuli: {:.2}; range {} - {}",
            means.mean, means.min, means.max
        );
    }
    info!(
        "Provider calls: {}; estimated cost ${:.4}",
        summary.provider_calls,
        nanos_to_usd(summary.cost_nanodollars)
    );
}
