//! CLI error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use relayfetch::{ConfigError, FetchError, PoolError, TransportError};

/// Errors surfaced to the user by the CLI.
#[derive(Debug)]
pub enum CliError {
    /// The config file could not be loaded.
    Config(ConfigError),
    /// The engine could not be started.
    Setup(String),
    /// Logging could not be initialized.
    Logging(String),
    /// The download finished with an error.
    Fetch(FetchError),
    /// The downloaded body could not be written.
    Output { path: PathBuf, source: io::Error },
    /// A probed URL does not exist.
    NotFound(String),
    /// The user pressed Ctrl+C.
    Interrupted,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "{}", e),
            CliError::Setup(msg) => write!(f, "Setup failed: {}", msg),
            CliError::Logging(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Fetch(e) => match std::error::Error::source(e) {
                Some(cause) => write!(f, "{} (caused by: {})", e, cause),
                None => write!(f, "{}", e),
            },
            CliError::Output { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            CliError::NotFound(url) => write!(f, "{} does not exist", url),
            CliError::Interrupted => write!(f, "Interrupted"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Fetch(e) => Some(e),
            CliError::Output { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<PoolError> for CliError {
    fn from(e: PoolError) -> Self {
        CliError::Setup(e.to_string())
    }
}

impl From<TransportError> for CliError {
    fn from(e: TransportError) -> Self {
        CliError::Setup(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_includes_cause() {
        let err = CliError::Fetch(FetchError::RetryExhausted {
            url: "http://a".to_string(),
            attempts: 2,
            cause: Some(Box::new(FetchError::HttpStatus {
                url: "http://a".to_string(),
                status: 500,
            })),
        });

        let text = err.to_string();
        assert!(text.contains("retry too many times"));
        assert!(text.contains("caused by: HTTP 500"));
    }

    #[test]
    fn test_not_found_display() {
        let err = CliError::NotFound("http://a/b".to_string());
        assert_eq!(err.to_string(), "http://a/b does not exist");
    }
}
