//! Subscriber setup for the headless client.
//!
//! `--log-level` raises or lowers the coach crates only; dependencies stay at
//! `warn` so a debug session shows delivery decisions, not HTTP internals.
//! `COACH_LOG_FILTER` replaces the whole filter when that is not enough.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use clap::ValueEnum;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const FILTER_OVERRIDE_ENV: &str = "COACH_LOG_FILTER";

/// Crates whose verbosity follows `--log-level`.
const COACH_CRATES: &[&str] = &["coach_overlay", "coach_bus"];

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid COACH_LOG_FILTER `{filter}`: {reason}")]
    Filter { filter: String, reason: String },
    #[error("failed to install subscriber: {0}")]
    Configure(String),
}

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(config: &LogConfig) -> Result<(), InitError> {
    if GUARD.get().is_some() {
        return Ok(());
    }

    let filter = match std::env::var(FILTER_OVERRIDE_ENV) {
        Ok(raw) => parse_override(&raw)?,
        Err(_) => EnvFilter::new(default_directives(config.level)),
    };

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    // Coach events name their component in a `target` field already.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Configure(err.to_string()))?;

    let _ = GUARD.set(guard);
    Ok(())
}

fn default_directives(level: LogLevel) -> String {
    let base = if level == LogLevel::Error { "error" } else { "warn" };
    let mut directives = base.to_owned();
    for krate in COACH_CRATES {
        directives.push_str(&format!(",{krate}={}", level.as_str()));
    }
    directives
}

fn parse_override(raw: &str) -> Result<EnvFilter, InitError> {
    EnvFilter::try_new(raw).map_err(|err| InitError::Filter {
        filter: raw.to_owned(),
        reason: err.to_string(),
    })
}
