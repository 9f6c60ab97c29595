//! Process-wide session stats and the append-only trajectory recorder.
//!
//! Grounded on `llm_client.py`'s usage-accounting touch points (token totals
//! updated from provider usage, falling back to a length heuristic) and the
//! trajectory file pywen writes per session for offline replay.

use crate::error::Result;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Process-wide atomic counters, cheap to read from any task without
/// locking.
#[derive(Debug, Default)]
pub struct SessionStats {
    tasks_started: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_usage(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// Usage fallback for providers/events that omit token counts: roughly
    /// one token per four characters of output text, mirroring the
    /// estimator in [`crate::context::estimate_tokens`].
    pub fn record_text_fallback(&self, text: &str) {
        self.completion_tokens
            .fetch_add((text.len() as u64).div_ceil(4), Ordering::Relaxed);
    }

    pub fn tasks_started(&self) -> u64 {
        self.tasks_started.load(Ordering::Relaxed)
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.load(Ordering::Relaxed) + self.completion_tokens.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            tasks_started: self.tasks_started(),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatsSnapshot {
    pub tasks_started: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// One line of the trajectory file: either an input message appended to
/// history, or a response frame received from a provider.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrajectoryRecord {
    Input {
        task_id: String,
        item: serde_json::Value,
        timestamp: chrono::DateTime<Utc>,
    },
    Response {
        task_id: String,
        frame: serde_json::Value,
        timestamp: chrono::DateTime<Utc>,
    },
}

/// Append-only JSON-lines writer for one session's trajectory file.
///
/// Write failures are logged, not propagated — a trajectory recorder losing
/// its backing file should never fail the agent loop.
pub struct TrajectoryRecorder {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl TrajectoryRecorder {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, record: &TrajectoryRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize trajectory record");
                return;
            }
        };

        let mut guard = self.file.lock().await;
        let Some(file) = guard.as_mut() else { return };
        if let Err(err) = file.write_all(line.as_bytes()).await {
            tracing::warn!(error = %err, path = %self.path.display(), "failed to write trajectory record");
            return;
        }
        if let Err(err) = file.write_all(b"\n").await {
            tracing::warn!(error = %err, path = %self.path.display(), "failed to write trajectory newline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_usage_accumulates_across_turns() {
        let stats = SessionStats::new();
        stats.record_usage(10, 5);
        stats.record_usage(3, 2);
        assert_eq!(stats.total_tokens(), 20);
    }

    #[test]
    fn record_text_fallback_uses_quarter_char_heuristic() {
        let stats = SessionStats::new();
        stats.record_text_fallback("12345678"); // 8 chars -> 2 tokens
        assert_eq!(stats.total_tokens(), 2);
    }

    #[tokio::test]
    async fn trajectory_recorder_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory.jsonl");
        let recorder = TrajectoryRecorder::open(&path).await.unwrap();
        recorder
            .record(&TrajectoryRecord::Input {
                task_id: "t1".to_string(),
                item: serde_json::json!({"role": "user", "content": "hi"}),
                timestamp: Utc::now(),
            })
            .await;
        recorder
            .record(&TrajectoryRecord::Response {
                task_id: "t1".to_string(),
                frame: serde_json::json!({"type": "response.completed"}),
                timestamp: Utc::now(),
            })
            .await;

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
