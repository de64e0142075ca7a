//! Error types for gridscan-fetch.

use std::time::Duration;

use thiserror::Error;

/// How the retry loop treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeouts, dropped connections, 5xx. Retried with backoff.
    Transient,
    /// 429 or an explicit rate-limit signal. Retried, and the limiter cools down.
    RateLimited,
    /// Anything retrying cannot fix. The cell is skipped at once.
    Fatal,
}

/// A failed page request, classified by HTTP-style status class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("page request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("rate limited by source (HTTP {status})")]
    RateLimited {
        status: u16,
        retry_after: Option<Duration>,
    },

    #[error("authentication failed (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid cell geometry: {0}")]
    InvalidGeometry(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("cancelled while waiting for a request slot")]
    Cancelled,
}

impl SourceError {
    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited {
                status,
                retry_after,
            },
            401 | 403 => Self::Unauthorized { status },
            408 => Self::Network(format!("HTTP 408: {message}")),
            500..=599 => Self::Server { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout | Self::Network(_) | Self::Server { .. } => ErrorClass::Transient,
            Self::RateLimited { .. } => ErrorClass::RateLimited,
            Self::Unauthorized { .. }
            | Self::Rejected { .. }
            | Self::InvalidGeometry(_)
            | Self::MalformedResponse(_)
            | Self::Cancelled => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() != ErrorClass::Fatal
    }

    /// Source-provided wait hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Why a retried operation did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: SourceError },

    #[error("fatal error on attempt {attempts}: {error}")]
    Fatal { attempts: u32, error: SourceError },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Fatal { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    /// The last error the source reported, if the loop did not stop on cancellation.
    pub fn last_error(&self) -> Option<&SourceError> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Fatal { error, .. } => Some(error),
            Self::Cancelled { .. } => None,
        }
    }
}
