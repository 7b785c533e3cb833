//! Tracing setup for the `backoffice` binary.
//!
//! `backoffice serve` is long-running and writes to a timestamped file under
//! the data directory's `logs/`. One-shot commands (`drafts`, `wizards`,
//! `openapi`) log to stderr so their stdout stays machine-readable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// How the binary is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// The REST server
    Serve,
    /// A one-shot CLI command
    Command,
}

/// Where log lines end up
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    File { dir: PathBuf, name: String },
    Stderr,
}

impl LogTarget {
    fn for_mode(config: &Config, mode: RunMode) -> Self {
        match mode {
            RunMode::Serve if config.logging.to_file => LogTarget::File {
                dir: config.logs_path(),
                name: format!(
                    "backoffice-{}.log",
                    chrono::Utc::now().format("%Y%m%dT%H%M%SZ")
                ),
            },
            _ => LogTarget::Stderr,
        }
    }
}

/// Keeps the file writer alive; drop it last so buffered lines are flushed
pub struct LoggingHandle {
    _guard: Option<WorkerGuard>,
    pub log_file_path: Option<PathBuf>,
}

/// `RUST_LOG` wins; otherwise `--debug` or the configured level
fn filter_directive(config: &Config, debug: bool) -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if debug {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        }
    })
}

pub fn init_logging(config: &Config, mode: RunMode, debug: bool) -> Result<LoggingHandle> {
    let filter = EnvFilter::try_new(filter_directive(config, debug))
        .context("Invalid log filter")?;

    let (writer, guard, log_file_path, ansi) = match LogTarget::for_mode(config, mode) {
        LogTarget::File { dir, name } => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(&dir, &name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (
                BoxMakeWriter::new(non_blocking),
                Some(guard),
                Some(dir.join(name)),
                false,
            )
        }
        LogTarget::Stderr => (BoxMakeWriter::new(std::io::stderr), None, None, true),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(writer),
        )
        .try_init()
        .context("Logging was already initialized")?;

    Ok(LoggingHandle {
        _guard: guard,
        log_file_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.data = temp_dir.path().to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_server_logs_to_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        match LogTarget::for_mode(&config, RunMode::Serve) {
            LogTarget::File { dir, name } => {
                assert!(dir.starts_with(temp_dir.path()));
                assert!(dir.ends_with("logs"));
                assert!(name.starts_with("backoffice-"));
                assert!(name.ends_with("Z.log"));
            }
            LogTarget::Stderr => panic!("expected a log file when serving"),
        }
    }

    #[test]
    fn test_commands_log_to_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        assert_eq!(
            LogTarget::for_mode(&config, RunMode::Command),
            LogTarget::Stderr
        );
    }

    #[test]
    fn test_file_logging_can_be_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(&temp_dir);
        config.logging.to_file = false;
        assert_eq!(LogTarget::for_mode(&config, RunMode::Serve), LogTarget::Stderr);
    }

    #[test]
    fn test_debug_flag_overrides_level() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let mut config = Config::default();
        config.logging.level = "warn".into();
        assert_eq!(filter_directive(&config, false), "warn");
        assert_eq!(filter_directive(&config, true), "debug");
    }
}
