//! Error types for Quizsmith.
//!
//! Library crates use [`QuizsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Quizsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum QuizsmithError {
    /// Configuration loading or validation error. Fatal: aborts the run
    /// before any work begins.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the generation backend or the job API.
    /// Retryable with bounded attempts before becoming an item failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// The generation response contained no parseable structured object.
    /// Not retried within the same attempt.
    #[error("malformed output: {message}")]
    MalformedOutput { message: String },

    /// Candidate failed schema or invariant checks.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Database or storage layer error. Fails the item, never the batch.
    #[error("storage error: {0}")]
    Storage(String),

    /// The polling budget for a generation job was exhausted before the job
    /// reached a terminal state. All outstanding items count as failed.
    #[error("job {job_id} did not finish within {waited_secs}s")]
    JobTimeout { job_id: String, waited_secs: u64 },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QuizsmithError>;

impl QuizsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-output error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedOutput {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the operation that produced this error may be retried.
    ///
    /// Only transport-level backend failures qualify; malformed output and
    /// validation failures are deterministic for a given response.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = QuizsmithError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = QuizsmithError::validation("expected 4 options, got 3");
        assert!(err.to_string().contains("got 3"));

        let err = QuizsmithError::JobTimeout {
            job_id: "job-7".into(),
            waited_secs: 180,
        };
        assert!(err.to_string().contains("job-7"));
        assert!(err.to_string().contains("180"));
    }

    #[test]
    fn retryability() {
        assert!(QuizsmithError::Backend("connection reset".into()).is_retryable());
        assert!(!QuizsmithError::malformed("no JSON object").is_retryable());
        assert!(!QuizsmithError::validation("bad payload").is_retryable());
        assert!(!QuizsmithError::Storage("disk full".into()).is_retryable());
    }
}
