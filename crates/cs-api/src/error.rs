//! Error types for CloudStack API operations.
//!
//! Covers credential resolution, request construction, the HTTP round-trip,
//! response decoding and async job tracking.

use thiserror::Error;

/// Result type alias for CloudStack API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the CloudStack API.
#[derive(Debug, Error)]
pub enum Error {
    /// No credential source resolved, or a selected source was incomplete.
    #[error("configuration error: {reason}")]
    Config {
        /// What was missing or malformed.
        reason: String,
    },

    /// A request parameter was rejected before signing.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The server answered with an error envelope.
    #[error("api error{}: {text}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
    Api {
        /// Server error code, when one was reported.
        code: Option<i64>,
        /// Server error text.
        text: String,
    },

    /// The response body did not have a recognizable envelope.
    #[error("unexpected response: {reason}")]
    Protocol {
        /// Description of what could not be decoded.
        reason: String,
    },

    /// The HTTP round-trip itself failed.
    #[error("http error{}: {message}", .status.map(|s| format!(" {s}")).unwrap_or_default())]
    Http {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Transport error description.
        message: String,
    },

    /// An async job reached a terminal non-success status.
    #[error("job {job_id} failed with status {status}{}", .text.as_ref().map(|t| format!(": {t}")).unwrap_or_default())]
    JobFailed {
        /// The job identifier.
        job_id: String,
        /// Terminal job status code.
        status: i64,
        /// Error text from the job result, if any.
        text: Option<String>,
    },

    /// The poll policy gave up before the job reached a terminal state.
    #[error("job {job_id} still pending after {attempts} status queries")]
    PollTimeout {
        /// The job identifier.
        job_id: String,
        /// Number of status queries issued.
        attempts: u32,
    },

    /// Polling was cancelled by the caller.
    #[error("polling of job {job_id} was cancelled")]
    Cancelled {
        /// The job identifier.
        job_id: String,
    },
}

impl Error {
    /// Creates a `Config` error.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidParameter` error.
    #[must_use]
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `Api` error.
    #[must_use]
    pub fn api(code: Option<i64>, text: impl Into<String>) -> Self {
        Self::Api {
            code,
            text: text.into(),
        }
    }

    /// Creates a `Protocol` error.
    #[must_use]
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    /// Creates an `Http` error.
    #[must_use]
    pub fn http(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Returns `true` if the error happened before any request was sent.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidParameter { .. })
    }
}
