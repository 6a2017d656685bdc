//! Centralized error handling for the systole pipeline.
//!
//! Errors are categorized with an `enum` so callers can match on the failure
//! class (I/O vs. bad configuration vs. a failed external script). The `From`
//! impls let `?` convert library errors automatically:
//!
//! ```no_run
//! use systole::error::Result;
//! use std::fs;
//!
//! fn read_config(path: &str) -> Result<String> {
//!     // std::io::Error converts to SystoleError via From
//!     let content = fs::read_to_string(path)?;
//!     Ok(content)
//! }
//! ```
//!
//! `ResultExt` adds `.context()` / `.with_context()` for attaching a message
//! to any error that converts into [`SystoleError`].

use std::fmt;

/// Main error type for systole operations.
#[derive(Debug)]
pub enum SystoleError {
    /// I/O errors (file operations, process spawning)
    Io(std::io::Error),

    /// Data processing errors (Polars, dataset shape problems)
    Data(String),

    /// Configuration errors (unreadable or invalid config files)
    Config(String),

    /// External script execution errors (Rscript failures, timeouts)
    Script(String),

    /// Model training or evaluation errors
    Model(String),

    /// File not found or invalid path
    InvalidPath(String),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for SystoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Data(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Script(msg) => write!(f, "Script execution error: {msg}"),
            Self::Model(msg) => write!(f, "Model error: {msg}"),
            Self::InvalidPath(msg) => write!(f, "Invalid path: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SystoleError {}

impl From<std::io::Error> for SystoleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for SystoleError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<serde_json::Error> for SystoleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for SystoleError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::Data(err.to_string())
    }
}

/// Result type alias for systole operations.
pub type Result<T> = std::result::Result<T, SystoleError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SystoleError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: SystoleError = e.into();
            SystoleError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: SystoleError = e.into();
            SystoleError::Other(format!("{}: {}", f(), err))
        })
    }
}
