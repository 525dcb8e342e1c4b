//! Tracing subscriber initialization, grounded on the teacher's
//! `infrastructure::logging::logger` module: an `EnvFilter` driven by the
//! configured level, a format switch between compact pretty output (for a
//! human at a terminal) and JSON (for log aggregation), and an optional
//! rolling file appender alongside stdout.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::infrastructure::config::LoggingSection;

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initializes the global `tracing` subscriber from a [`LoggingSection`].
///
/// Returns a [`WorkerGuard`] that must be held for the lifetime of the
/// process when file logging is enabled — dropping it flushes and closes
/// the non-blocking writer.
pub fn init(section: &LoggingSection) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&section.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let format = LogFormat::from_str(&section.format);

    let stdout_layer = build_stdout_layer(format);

    match &section.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(Path::new(dir))?;
            let file_appender = tracing_appender::rolling::daily(dir, "swarm.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .json()
                .boxed();

            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .with(file_layer)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout_layer)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
            Ok(None)
        }
    }
}

fn build_stdout_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
    }
}
