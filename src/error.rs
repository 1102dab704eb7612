//! Error taxonomy for the recall and debate engines.
//!
//! Configuration and integrity errors are fatal. Timeouts and backend failures
//! are transient and surface to the caller as explicit failures; they are never
//! turned into a verdict. Malformed judge output is not an error at all, it
//! becomes [`crate::judge::Judgment::Unparseable`].

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("vector dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("{what} failed: {message}")]
    Backend { what: String, message: String },

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(detail = %msg, "data integrity violation; run `mindloop reindex`");
        Self::Integrity(msg)
    }

    /// Timeouts and backend failures may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Backend { .. })
    }

    /// Errors that must abort initialization or require a rebuild.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::DimensionMismatch { .. } | Self::Integrity(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let timeout = Error::Timeout {
            what: "neutral judge".into(),
            after: Duration::from_secs(3),
        };
        assert!(timeout.is_transient());
        assert!(!timeout.is_fatal());

        let dim = Error::DimensionMismatch {
            expected: 384,
            actual: 1024,
        };
        assert!(dim.is_fatal());
        assert!(!dim.is_transient());
        assert_eq!(
            dim.to_string(),
            "vector dimension mismatch: index holds 384, got 1024"
        );
    }

    #[test]
    fn timeout_message_names_the_call() {
        let err = Error::Timeout {
            what: "persona judge".into(),
            after: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "persona judge timed out after 250ms");
    }
}
