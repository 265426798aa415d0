//! CLI error types.

use thiserror::Error;

/// Exit status for usage errors.
pub const EXIT_USAGE: u8 = 2;

/// Exit status for every other failure.
pub const EXIT_FAILURE: u8 = 1;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command line is incomplete or inconsistent.
    #[error("{0}")]
    Usage(String),

    /// Credential resolution, dispatch or job tracking failed.
    #[error(transparent)]
    Api(#[from] cs_api::Error),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The invocation was interrupted before the command finished.
    #[error("interrupted")]
    Interrupted,
}

impl CliError {
    /// Creates a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_error_display_and_exit_code() {
        let err = CliError::usage("Either a Network or Security Group ID is required.");
        assert_eq!(
            err.to_string(),
            "Either a Network or Security Group ID is required."
        );
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }

    #[test]
    fn api_error_is_transparent() {
        let err = CliError::from(cs_api::Error::api(None, "bad key"));
        assert_eq!(err.to_string(), "api error: bad key");
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let cli_err = CliError::from(io_err);
        assert!(matches!(cli_err, CliError::Io(_)));
        assert_eq!(cli_err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn interrupted_exits_with_failure() {
        assert_eq!(CliError::Interrupted.to_string(), "interrupted");
        assert_eq!(CliError::Interrupted.exit_code(), EXIT_FAILURE);
    }
}
