//! Process-wide structured logging setup.
//!
//! New component — the teacher prints straight to stdout/stderr with no
//! level filtering. Grounded on SPEC_FULL.md §4.9: one `tracing_subscriber`
//! init at process start, level resolved from `--log-level` / `RUST_LOG` /
//! the config file, output to stderr and (for the CLI binary) a rolling file
//! under `$PYWEN_HOME/logs`.

use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Priority order for resolving the effective log level: an explicit CLI
/// flag wins, then `RUST_LOG`, then the config file's `log_level`, then
/// `info`.
pub fn resolve_level(cli_flag: Option<&str>, config_log_level: Option<&str>) -> String {
    if let Some(level) = cli_flag {
        return level.to_string();
    }
    if let Ok(level) = std::env::var("RUST_LOG") {
        return level;
    }
    if let Some(level) = config_log_level {
        return level.to_string();
    }
    "info".to_string()
}

/// Initialize the global `tracing` subscriber. Safe to call at most once per
/// process; a second call is a silent no-op rather than a panic, so tests
/// that construct multiple agents in one binary don't need to coordinate.
pub fn init(level: &str, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match log_dir {
        Some(dir) => {
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("failed to create log directory {}: {err}", dir.display());
                return init_stderr_only(filter);
            }
            let file_appender = tracing_appender::rolling::daily(dir, "pywen-agent.log");
            let writer = file_appender.and(std::io::stderr);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_target(true)
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized, skipping");
    }
}

fn init_stderr_only(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_everything() {
        assert_eq!(resolve_level(Some("debug"), Some("warn")), "debug");
    }

    #[test]
    fn config_level_used_when_no_flag_or_env() {
        // SAFETY: test-local env var, not read by any other test concurrently
        // relying on its absence.
        unsafe {
            std::env::remove_var("RUST_LOG");
        }
        assert_eq!(resolve_level(None, Some("warn")), "warn");
    }

    #[test]
    fn defaults_to_info() {
        unsafe {
            std::env::remove_var("RUST_LOG");
        }
        assert_eq!(resolve_level(None, None), "info");
    }
}
