use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rating_harness::batch::BatchDriver;
use rating_harness::collector::{CollectorConfig, Outcome, RatingCollector, RetryPolicy};
use rating_harness::gateway::{ChatGateway, ChatModel, ChatRequest, ChatResponse, ProviderError};
use rating_harness::output::{CsvOutputSink, CSV_HEADER, ERROR_MARKER};
use rating_harness::prompts::BASIC_QUALITY_PROMPT;
use rating_harness::stimulus::{from_urls, Stimulus};
use tempfile::tempdir;

/// Answers per stimulus id; ids without an entry fail with a retryable error.
struct KeyedGateway {
    answers: HashMap<String, (Vec<&'static str>, Duration)>,
    calls: AtomicUsize,
}

impl KeyedGateway {
    fn new(entries: &[(&str, &[&'static str], u64)]) -> Arc<Self> {
        Arc::new(Self {
            answers: entries
                .iter()
                .map(|(id, texts, delay_ms)| {
                    (
                        id.to_string(),
                        (texts.to_vec(), Duration::from_millis(*delay_ms)),
                    )
                })
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatGateway for KeyedGateway {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = req.attribution.stimulus_id.clone().unwrap_or_default();
        match self.answers.get(&id) {
            Some((texts, delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(ChatResponse::from_texts(
                    texts.iter().copied().take(req.n as usize),
                ))
            }
            None => Err(ProviderError::provider("openai", "HTTP 502", true)),
        }
    }
}

fn collector(gateway: Arc<KeyedGateway>) -> RatingCollector {
    let mut cfg = CollectorConfig::new(
        ChatModel::openai("gpt-4.1"),
        BASIC_QUALITY_PROMPT.to_prompt(),
    );
    cfg.retry = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };
    RatingCollector::new(gateway, cfg)
}

fn read_csv(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[tokio::test]
async fn empty_input_writes_header_only_and_makes_no_calls() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("ratings.csv");
    let gw = KeyedGateway::new(&[]);
    let driver = BatchDriver::new(collector(gw.clone()), Arc::new(CsvOutputSink::new(&out)));

    let report = driver
        .run_batch(&[], 5, 5, Duration::from_secs(1))
        .await
        .unwrap();

    assert!(report.rows.is_empty());
    assert_eq!(report.summary.stimuli, 0);
    assert_eq!(report.summary.means, None);
    assert_eq!(gw.calls(), 0);
    assert_eq!(read_csv(&out), vec![CSV_HEADER.map(str::to_string).to_vec()]);
}

#[tokio::test]
async fn failing_stimulus_does_not_block_the_rest() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("nested").join("ratings.csv");
    let gw = KeyedGateway::new(&[
        ("https://img/a.jpg", &["3", "3", "4", "5", "3"], 0),
        ("https://img/c.jpg", &["5", "5", "5", "5", "5"], 0),
    ]);
    let stimuli = from_urls(["https://img/a.jpg", "https://img/b.jpg", "https://img/c.jpg"]);
    let driver = BatchDriver::new(collector(gw.clone()), Arc::new(CsvOutputSink::new(&out)));

    let report = driver
        .run_batch(&stimuli, 5, 5, Duration::ZERO)
        .await
        .unwrap();

    let ids: Vec<&str> = report.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["https://img/a.jpg", "https://img/b.jpg", "https://img/c.jpg"]
    );
    assert!(matches!(
        report.rows[1].result.outcome,
        Outcome::Failed { .. }
    ));
    // One call for a, three attempts for b, one call for c.
    assert_eq!(gw.calls(), 5);

    let summary = &report.summary;
    assert_eq!(summary.stimuli, 3);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    let means = summary.means.unwrap();
    assert_eq!(means.count, 2);
    assert_eq!(means.min, 3.6);
    assert_eq!(means.max, 5.0);
    assert!((means.mean - 4.3).abs() < 1e-9);
    assert_eq!(summary.provider_calls, 5);

    let rows = read_csv(&out);
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[1],
        vec![
            "https://img/a.jpg",
            "3.6",
            "0.89",
            "5",
            "[3, 3, 4, 5, 3]",
            "complete"
        ]
    );
    assert_eq!(rows[2][0], "https://img/b.jpg");
    assert_eq!(rows[2][1], ERROR_MARKER);
    assert_eq!(rows[2][2], "");
    assert!(rows[2][5].starts_with("failed"));
    assert_eq!(rows[3][1], "5");
    assert_eq!(rows[3][2], "0");
}

#[tokio::test]
async fn concurrent_batch_keeps_input_order() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("ratings.csv");
    let gw = KeyedGateway::new(&[
        ("slow", &["1", "1"], 60),
        ("mid", &["2", "2"], 30),
        ("fast", &["3", "3"], 0),
    ]);
    let stimuli = vec![
        Stimulus::text("slow", "a"),
        Stimulus::text("mid", "b"),
        Stimulus::text("fast", "c"),
    ];
    let driver = BatchDriver::new(collector(gw), Arc::new(CsvOutputSink::new(&out)))
        .with_concurrency(3);

    let report = driver
        .run_batch(&stimuli, 2, 2, Duration::ZERO)
        .await
        .unwrap();

    let means: Vec<Option<f64>> = report.rows.iter().map(|r| r.result.mean).collect();
    assert_eq!(means, vec![Some(1.0), Some(2.0), Some(3.0)]);
    let ids: Vec<String> = read_csv(&out).into_iter().skip(1).map(|r| r[0].clone()).collect();
    assert_eq!(ids, vec!["slow", "mid", "fast"]);
}

#[tokio::test(start_paused = true)]
async fn throttle_pauses_between_stimuli_only() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("ratings.csv");
    let gw = KeyedGateway::new(&[("a", &["4"], 0), ("b", &["4"], 0), ("c", &["4"], 0)]);
    let stimuli = vec![
        Stimulus::text("a", "x"),
        Stimulus::text("b", "y"),
        Stimulus::text("c", "z"),
    ];
    let driver = BatchDriver::new(collector(gw), Arc::new(CsvOutputSink::new(&out)));

    let started = tokio::time::Instant::now();
    driver
        .run_batch(&stimuli, 1, 1, Duration::from_secs(2))
        .await
        .unwrap();
    // Two gaps between three stimuli, none after the last.
    assert_eq!(started.elapsed(), Duration::from_secs(4));
}
