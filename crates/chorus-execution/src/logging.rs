//! Global tracing subscriber setup.

use crate::round_events::{RoundEvent, RoundEventLayer, is_round_event};
use chorus_core::{ChorusError, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// File name prefix of rolling log files.
pub const LOG_FILE_PREFIX: &str = "chorus.log";

/// Output encoding of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Options for [`init_tracing`].
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub format: LogFormat,
    /// Directory for daily rolling files; stderr when `None`
    pub log_dir: Option<PathBuf>,
    /// Filter used when `RUST_LOG` is unset
    pub default_directive: String,
    /// Receives `chorus::round` events regardless of the log filter
    pub round_events: Option<mpsc::UnboundedSender<RoundEvent>>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            log_dir: None,
            default_directive: "info".to_string(),
            round_events: None,
        }
    }
}

impl LoggingOptions {
    /// `RUST_LOG` if set and valid, else `default_directive`.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.default_directive).map_err(|e| {
                ChorusError::config(format!(
                    "invalid log filter '{}': {}",
                    self.default_directive, e
                ))
            }),
        }
    }
}

/// Installs the global subscriber.
///
/// `log` records (the completion retry helper logs through `log`) are
/// bridged into tracing. The returned guard flushes the file writer and
/// must be kept alive for the life of the program.
pub fn init_tracing(options: LoggingOptions) -> Result<Option<WorkerGuard>> {
    let filter = options.env_filter()?;

    let (writer, guard) = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };
    let to_file = guard.is_some();

    let fmt_layer = match options.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_ansi(!to_file)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    };
    let round_layer = options
        .round_events
        .map(|sender| RoundEventLayer::new(sender).with_filter(filter_fn(is_round_event)));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(round_layer)
        .try_init()
        .map_err(|e| ChorusError::internal(format!("failed to install tracing subscriber: {}", e)))?;

    tracing::debug!(
        "[Logging] Initialized ({:?}, {})",
        options.format,
        options
            .log_dir
            .as_ref()
            .map_or_else(|| "stderr".to_string(), |dir| dir.display().to_string())
    );
    Ok(guard)
}
