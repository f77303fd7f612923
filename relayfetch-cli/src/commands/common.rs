//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use relayfetch::{DispatchQueue, FetchConfig, Fetcher, MainThreadDrain, ReqwestTransport, WorkerPool};

use crate::error::CliError;

/// Interval between drain ticks while waiting on the engine.
pub const TICK_INTERVAL_MS: u64 = 16;

/// Default location of the config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("relayfetch").join("config.ini"))
}

/// Loads the config from `explicit`, else from the default location if it
/// exists, else the built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<FetchConfig, CliError> {
    if let Some(path) = explicit {
        return Ok(FetchConfig::load(path)?);
    }

    match default_config_path() {
        Some(path) if path.is_file() => Ok(FetchConfig::load(&path)?),
        _ => Ok(FetchConfig::default()),
    }
}

/// The fetcher plus the drain owned by the main thread.
pub struct Engine {
    pub fetcher: Fetcher,
    drain: MainThreadDrain,
}

impl Engine {
    pub fn new(config: FetchConfig) -> Result<Self, CliError> {
        let pool = Arc::new(WorkerPool::new(config.worker_threads)?);
        let (dispatcher, drain) = DispatchQueue::new(pool);
        let transport = Arc::new(ReqwestTransport::new()?);

        Ok(Self {
            fetcher: Fetcher::new(transport, dispatcher, config),
            drain,
        })
    }

    /// Runs queued main-thread work: log lines and completion callbacks.
    pub fn pump(&mut self) -> usize {
        self.drain.tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_explicit_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[fetch]\nmax_retries = 3\nprobe_timeout_ms = 1500").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.probe_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.ini")));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_default_config_path_layout() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("relayfetch/config.ini"));
        }
    }
}
