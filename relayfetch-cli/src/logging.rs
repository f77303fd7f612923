//! Logging setup for the CLI.
//!
//! Engine events reach the terminal through the main-thread log layer, so
//! they are printed while the command ticks the drain. `--log-file` adds a
//! plain fmt layer behind a non-blocking appender.

use std::path::Path;

use console::style;
use relayfetch::{Dispatcher, LogSink, MainThreadLogLayer};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::CliError;

/// Writes engine log lines to stderr, colored by severity.
struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn info(&self, message: &str) {
        eprintln!("{}", style(message).dim());
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", style(message).yellow());
    }

    fn error(&self, message: &str) {
        eprintln!("{}", style(message).red().bold());
    }
}

/// Default filter when `RUST_LOG` is not set.
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive until exit so the log file is flushed.
pub fn init(
    dispatcher: Dispatcher,
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>, CliError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().ok_or_else(|| {
                CliError::Logging(format!("{} is not a file path", path.display()))
            })?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(MainThreadLogLayer::new(dispatcher, ConsoleSink))
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    Ok(guard)
}
