//! # dharmaloops-logging
//!
//! Logging for dharmaloops reasoning sessions.
//!
//! ## Key Types
//!
//! - [`Logger`] - Structured session event logging
//! - [`LogEvent`] - Log event types, including per-step telemetry
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact, Silent)

mod events;

pub use events::{LogEvent, LogFormat, Logger};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize tracing for the application.
///
/// When `log_dir` is set, diagnostics are also written to a daily rolling
/// file there. Keep the returned guard alive until shutdown so buffered
/// lines are flushed.
pub fn init_tracing(level: &str, format: LogFormat, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let guard = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "dharmaloops.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    match format {
        LogFormat::Json => layers.push(
            fmt::layer()
                .json()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed(),
        ),
        LogFormat::Pretty | LogFormat::Compact | LogFormat::Silent => layers.push(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed(),
        ),
    }

    tracing_subscriber::registry().with(layers).with(filter).init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_writes_log_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let guard = init_tracing("info", LogFormat::Silent, Some(dir.path()));
        assert!(guard.is_some());

        tracing::error!(marker = "file-sink-check", "Tracing file sink initialized");
        drop(guard);

        let contents: String = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(contents.contains("file-sink-check"));
    }
}
