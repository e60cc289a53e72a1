//! Error types shared by the conversion and export paths.

use thiserror::Error;

/// Errors surfaced to callers of the conversion and export APIs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The request was rejected before any conversion was attempted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The provider failed or answered with something unusable.
    #[error("conversion unavailable: {0}")]
    ConversionUnavailable(String),

    /// The TeX compiler collaborator failed.
    #[error("compilation failed ({backend}): {message}{}", diagnostic(.log_tail))]
    CompilationFailed {
        backend: String,
        message: String,
        /// Bounded tail of the compiler log or response body.
        log_tail: String,
    },
}

impl Error {
    /// Stable machine-readable name used in JSON error bodies.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ConversionUnavailable(_) => "conversion_unavailable",
            Self::CompilationFailed { .. } => "compilation_failed",
        }
    }

}

/// Compiler output appended below the failure line, when there is any.
fn diagnostic(log_tail: &str) -> String {
    if log_tail.trim().is_empty() {
        String::new()
    } else {
        format!("\n{log_tail}")
    }
}

/// Failure of a single batch call to a text-to-LaTeX provider.
///
/// Kept as owned strings so results can travel through channels and
/// be compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("request timed out")]
    Timeout,
    #[error("unable to reach provider: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<ServiceError> for Error {
    fn from(err: ServiceError) -> Self {
        Self::ConversionUnavailable(err.to_string())
    }
}
