//! `SessionConfig` file loading + environment-variable override resolution
//! (spec.md §6), paired with `SessionStats`/`TrajectoryRecorder` exercising a
//! simulated task's usage accounting and replay log end to end.

use agent_core::config::SessionConfig;
use agent_core::{ProviderKind, SessionStats, TrajectoryRecord, TrajectoryRecorder};
use chrono::Utc;
use serde_json::json;

#[tokio::test]
async fn session_config_loads_and_resolves_without_env_overrides() {
    // SAFETY: test-local env vars, cleared before and after this test runs.
    unsafe {
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("OPENAI_BASE_URL");
        std::env::remove_var("OPEN_AGENT_BASE_URL");
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pywen_config.json");
    tokio::fs::write(
        &path,
        json!({
            "model_config": {
                "provider": "compatible",
                "base_url": "http://localhost:11434/v1",
                "model": "qwen3:8b"
            },
            "max_iterations": 12,
            "max_turns": 8
        })
        .to_string(),
    )
    .await
    .unwrap();

    let config = SessionConfig::load(&path).await.unwrap();
    assert_eq!(config.max_iterations, 12);
    assert_eq!(config.max_turns, 8);

    let resolved = config.resolve().unwrap();
    assert_eq!(resolved.provider, ProviderKind::Compatible);
    assert_eq!(resolved.model, "qwen3:8b");
    assert_eq!(resolved.base_url.as_deref(), Some("http://localhost:11434/v1"));
    assert_eq!(resolved.max_iterations, 12);
    assert_eq!(resolved.max_turns, 8);
}

#[tokio::test]
async fn env_vars_take_priority_over_config_file_credentials() {
    // SAFETY: test-local env vars, cleared at the end of the test.
    unsafe {
        std::env::set_var("OPENAI_API_KEY", "env-key");
        std::env::set_var("OPENAI_BASE_URL", "http://env-base/v1");
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pywen_config.json");
    tokio::fs::write(
        &path,
        json!({
            "model_config": {
                "provider": "openai",
                "api_key": "file-key",
                "base_url": "http://file-base/v1",
                "model": "gpt-4o"
            }
        })
        .to_string(),
    )
    .await
    .unwrap();

    let config = SessionConfig::load(&path).await.unwrap();
    let resolved = config.resolve().unwrap();

    assert_eq!(resolved.api_key.as_deref(), Some("env-key"));
    assert_eq!(resolved.base_url.as_deref(), Some("http://env-base/v1"));

    // SAFETY: cleanup of the vars set above.
    unsafe {
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("OPENAI_BASE_URL");
    }
}

#[tokio::test]
async fn missing_config_file_surfaces_as_config_error() {
    let err = SessionConfig::load("/nonexistent/pywen_config.json").await.unwrap_err();
    assert!(err.to_string().contains("Invalid configuration"));
    assert!(err.to_string().contains("cannot read"));
}

#[tokio::test]
async fn session_stats_and_trajectory_recorder_track_one_simulated_task() {
    let dir = tempfile::tempdir().unwrap();
    let trajectory_path = dir.path().join("session-1.jsonl");
    let recorder = TrajectoryRecorder::open(&trajectory_path).await.unwrap();
    let stats = SessionStats::new();

    stats.task_started();
    recorder
        .record(&TrajectoryRecord::Input {
            task_id: "t1".to_string(),
            item: json!({"role": "user", "content": "hello"}),
            timestamp: Utc::now(),
        })
        .await;

    stats.record_usage(120, 40);
    recorder
        .record(&TrajectoryRecord::Response {
            task_id: "t1".to_string(),
            frame: json!({"type": "completed", "usage": {"input_tokens": 120, "output_tokens": 40}}),
            timestamp: Utc::now(),
        })
        .await;

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.tasks_started, 1);
    assert_eq!(snapshot.prompt_tokens + snapshot.completion_tokens, 160);

    let lines: Vec<String> = tokio::fs::read_to_string(&trajectory_path)
        .await
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"kind\":\"input\""));
    assert!(lines[1].contains("\"kind\":\"response\""));
}
