//! Engine configuration.
//!
//! [`FetchConfig`] collects the tunables of the fetch engine: the retry bound,
//! timeouts, the speed watchdog thresholds and the worker pool size. Values
//! can be built in code or read from the `[fetch]` section of an INI file:
//!
//! ```ini
//! [fetch]
//! max_retries = 1
//! default_timeout_ms = 20000
//! probe_timeout_ms = 20000
//! watchdog_grace_ms = 2000
//! min_bytes_per_sec = 1024
//! worker_threads = 4
//! read_chunk_size = 65536
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

/// Number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Timeout applied to requests that do not set a positive one (20 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Timeout for the synchronous existence and length probes.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 20_000;

/// Time an attempt may run before the speed watchdog starts judging it.
pub const DEFAULT_WATCHDOG_GRACE_MS: u64 = 2_000;

/// Minimum average throughput once the grace period is over.
pub const DEFAULT_MIN_BYTES_PER_SEC: f64 = 1024.0;

/// Size of the background worker pool.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Largest slice handed to a single transport read (64KB).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// INI section holding the engine settings.
const SECTION: &str = "fetch";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed.
    #[error("failed to load config: {0}")]
    Load(#[from] ini::Error),

    /// The text is not valid INI.
    #[error("failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    /// A key holds a value of the wrong type or out of range.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Tunables of the fetch engine.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchConfig {
    /// Retries after the first attempt (total attempts = `max_retries + 1`).
    pub max_retries: u32,

    /// Timeout used when a request does not carry a positive one.
    pub default_timeout: Duration,

    /// Timeout for `is_exist` / `content_length` probes.
    pub probe_timeout: Duration,

    /// Time before the watchdog starts measuring throughput.
    pub watchdog_grace: Duration,

    /// Minimum average bytes per second after the grace period.
    pub min_bytes_per_sec: f64,

    /// Threads in the background worker pool.
    pub worker_threads: usize,

    /// Largest slice handed to a single transport read.
    pub read_chunk_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            watchdog_grace: Duration::from_millis(DEFAULT_WATCHDOG_GRACE_MS),
            min_bytes_per_sec: DEFAULT_MIN_BYTES_PER_SEC,
            worker_threads: DEFAULT_WORKER_THREADS,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl FetchConfig {
    /// Load configuration from an INI file.
    ///
    /// Keys missing from the `[fetch]` section keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let Some(props) = ini.section(Some(SECTION)) else {
            return Ok(config);
        };

        read_key(props, "max_retries", &mut config.max_retries)?;
        read_millis(props, "default_timeout_ms", &mut config.default_timeout)?;
        read_millis(props, "probe_timeout_ms", &mut config.probe_timeout)?;
        read_millis(props, "watchdog_grace_ms", &mut config.watchdog_grace)?;
        read_key(props, "min_bytes_per_sec", &mut config.min_bytes_per_sec)?;
        read_key(props, "worker_threads", &mut config.worker_threads)?;
        read_key(props, "read_chunk_size", &mut config.read_chunk_size)?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(invalid("worker_threads", "0"));
        }
        if self.read_chunk_size == 0 {
            return Err(invalid("read_chunk_size", "0"));
        }
        if !self.min_bytes_per_sec.is_finite() || self.min_bytes_per_sec < 0.0 {
            return Err(invalid(
                "min_bytes_per_sec",
                &self.min_bytes_per_sec.to_string(),
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(invalid("default_timeout_ms", "0"));
        }
        Ok(())
    }

    /// Total number of attempts a session makes before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Set the number of retries after the first attempt.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the default request timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the watchdog thresholds.
    pub fn with_watchdog(mut self, grace: Duration, min_bytes_per_sec: f64) -> Self {
        self.watchdog_grace = grace;
        self.min_bytes_per_sec = min_bytes_per_sec;
        self
    }

    /// Set the worker pool size (at least one thread).
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Set the read chunk size (at least one byte).
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn read_key<T: FromStr>(props: &Properties, key: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Some(raw) = props.get(key) {
        *target = raw.trim().parse().map_err(|_| invalid(key, raw))?;
    }
    Ok(())
}

fn read_millis(props: &Properties, key: &str, target: &mut Duration) -> Result<(), ConfigError> {
    let mut millis = target.as_millis() as u64;
    read_key(props, key, &mut millis)?;
    *target = Duration::from_millis(millis);
    Ok(())
}
