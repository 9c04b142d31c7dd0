// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for Scoop captures
//!
//! Errors are classified so the capture pipeline can decide whether a failure
//! is fatal (invalid input, setup) or only degrades the result (steps, tools).

use thiserror::Error;

/// Result type alias for Scoop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Scoop
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or blocklisted capture target, or an operation called in the wrong state
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Browser or intercepter could not be started
    #[error("Capture setup failed: {0}")]
    Setup(String),

    /// A capture step failed
    #[error("Step '{step}' failed: {reason}")]
    Step { step: String, reason: String },

    /// External tool missing, misbehaving or exited non-zero
    #[error("External tool '{tool}' failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    /// A response was observed with no matching request
    #[error("No request matches response for {method} {url}")]
    Correlation { method: String, url: String },

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    /// Browser backend error
    #[error("Browser error: {0}")]
    Browser(String),

    /// Capability not provided by the browser backend
    #[error("Not supported by this backend: {0}")]
    Unsupported(String),

    /// Forwarding proxy error
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Attester configuration error
    #[error("Attester error: {0}")]
    Attester(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Regular expression failed to compile
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    SetupFailure,
    StepFailure,
    ExternalToolFailure,
    CorrelationFailure,
    Other,
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a setup error
    pub fn setup<S: Into<String>>(msg: S) -> Self {
        Error::Setup(msg.into())
    }

    /// Create a step error
    pub fn step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Step {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Create an external tool error
    pub fn external_tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ExternalTool {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create a correlation error
    pub fn correlation(method: impl Into<String>, url: impl Into<String>) -> Self {
        Error::Correlation {
            method: method.into(),
            url: url.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Create a browser error
    pub fn browser<S: Into<String>>(msg: S) -> Self {
        Error::Browser(msg.into())
    }

    /// Create an unsupported capability error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create a proxy error
    pub fn proxy<S: Into<String>>(msg: S) -> Self {
        Error::Proxy(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) | Error::Url(_) => ErrorKind::InvalidInput,
            Error::Setup(_) | Error::Config(_) | Error::Attester(_) => ErrorKind::SetupFailure,
            Error::ExternalTool { .. } => ErrorKind::ExternalToolFailure,
            Error::Correlation { .. } => ErrorKind::CorrelationFailure,
            Error::Step { .. }
            | Error::Timeout { .. }
            | Error::Browser(_)
            | Error::Unsupported(_)
            | Error::Proxy(_)
            | Error::Http(_) => ErrorKind::StepFailure,
            _ => ErrorKind::Other,
        }
    }

    /// Check if this is an invalid input error
    pub fn is_invalid_input(&self) -> bool {
        self.kind() == ErrorKind::InvalidInput
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if this is an external tool error
    pub fn is_external_tool(&self) -> bool {
        matches!(self, Error::ExternalTool { .. })
    }

    /// Check if the capture can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::InvalidInput | ErrorKind::SetupFailure
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add operation context to error
    fn context(self, msg: &str) -> Result<T>;

    /// Turn any error into a step failure for `step`
    fn step_context(self, step: &str) -> Result<T>;
}

impl<T, E: Into<Error>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            Error::Other(format!("{}: {}", msg, err))
        })
    }

    fn step_context(self, step: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            err @ Error::Step { .. } => err,
            err => Error::step(step, err.to_string()),
        })
    }
}
