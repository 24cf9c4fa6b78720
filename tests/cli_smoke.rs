use std::process::Command;

use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rating-harness"))
}

#[test]
fn presets_lists_builtin_prompts() {
    let output = cli().arg("presets").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("basic-quality\t1-5"));
    assert!(stdout.contains("image-quality\t1-100"));
    assert!(stdout.contains("sentiment\t1-7"));
}

#[test]
fn providers_lists_endpoints_and_key_variables() {
    let output = cli().arg("providers").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("openai\thttps://api.openai.com/v1\tOPENAI_API_KEY"));
    assert!(stdout.contains("deepinfra\thttps://api.deepinfra.com/v1/openai\tDEEPINFRA_API_KEY"));
    assert!(stdout.contains("custom\t(base_url required)\tRATING_API_KEY"));
}

#[test]
fn run_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("run.json");
    std::fs::write(
        &config,
        json!({
            "model": "gpt-4.1",
            "target_count": 0,
            "prompt": {"kind": "preset", "name": "basic-quality"},
            "source": {"kind": "urls", "urls": []}
        })
        .to_string(),
    )
    .unwrap();

    let output = cli().arg("run").arg("--config").arg(&config).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("target_count"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_rates_url_list_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {"message": {"content": "4"}, "finish_reason": "stop"},
                {"message": {"content": "4"}, "finish_reason": "stop"},
                {"message": {"content": "5"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 800, "completion_tokens": 3}
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = dir.path().join("run.json");
    let out = dir.path().join("ratings.csv");
    let manifest = dir.path().join("manifest.json");
    std::fs::write(
        &config,
        json!({
            "provider": "custom",
            "base_url": server.uri(),
            "model": "gpt-4.1",
            "prompt": {"kind": "preset", "name": "basic-quality"},
            "target_count": 3,
            "batch_size": 3,
            "throttle_ms": 0,
            "source": {
                "kind": "urls",
                "urls": ["https://example.com/a.jpg", "https://example.com/b.jpg"]
            }
        })
        .to_string(),
    )
    .unwrap();

    let mut cmd = cli();
    cmd.arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&out)
        .arg("--manifest")
        .arg(&manifest)
        .env("RATING_API_KEY", "sk-test");
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let csv = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Identifier,Average_Rating,Standard_Deviation,N_Valid,All_Ratings,Status"
    );
    assert_eq!(
        lines[1],
        "https://example.com/a.jpg,4.33,0.58,3,\"[4, 4, 5]\",complete"
    );
    assert!(lines[2].starts_with("https://example.com/b.jpg,4.33,"));

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest).unwrap()).unwrap();
    assert_eq!(manifest["provider"], "custom");
    assert_eq!(manifest["prompt_slug"], "basic-quality");
    assert_eq!(manifest["stimulus_count"], 2);
    assert_eq!(manifest["scale"], json!({"min": 1, "max": 5}));
    assert_eq!(manifest["summary"]["successful"], 2);
    assert_eq!(manifest["usage"]["calls"], 2);

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
