//! Error types for Azimuth.
//!
//! This module defines the error types used throughout Azimuth. The
//! taxonomy is deliberately small: sign-in gaps and cancellation are
//! conditions callers are expected to branch on, everything else is
//! surfaced with context and left to the host application.

use thiserror::Error;

/// Result type alias for Azimuth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Azimuth.
#[derive(Error, Debug)]
pub enum Error {
    /// No usable session exists for the requested scope.
    ///
    /// Raised for the whole operation when no account is signed in, or for
    /// a single account/tenant branch during aggregate discovery. The
    /// aggregate orchestrator catches and skips per-branch occurrences;
    /// direct resolver callers see it as the operation's failure.
    #[error("not signed in to Azure ({scope})")]
    NotSignedIn {
        /// What was being resolved: "any account", an account id, or an
        /// account/tenant pair (redacted).
        scope: String,
    },

    /// A supplied cancellation token fired.
    ///
    /// Always propagated, never swallowed, and takes precedence over any
    /// other error pending at the same suspension point.
    #[error("the operation was cancelled")]
    Cancelled,

    /// A remote request failed for a reason other than a missing session.
    #[error("Azure request failed ({context}): {message}")]
    Request {
        /// What was being fetched (redacted identifiers).
        context: String,
        /// Error message from the transport or service.
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The configuration surface is unusable as given.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Creates a `NotSignedIn` error for the given resolution scope.
    pub fn not_signed_in(scope: impl Into<String>) -> Self {
        Error::NotSignedIn {
            scope: scope.into(),
        }
    }

    /// Creates a `Request` error without an underlying source.
    pub fn request(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Request {
            context: context.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a `Request` error wrapping an underlying source error.
    pub fn request_with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Request {
            context: context.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if this is the recoverable "not signed in" condition.
    pub fn is_not_signed_in(&self) -> bool {
        matches!(self, Error::NotSignedIn { .. })
    }

    /// Returns true if this is the cancellation condition.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Shortens an account/tenant/subscription identifier for log output.
///
/// Identifiers are GUIDs or UPNs; the first eight characters are enough to
/// correlate log lines without writing the full value to the log.
pub(crate) fn redact(id: &str) -> String {
    if id.chars().count() <= 8 {
        id.to_string()
    } else {
        let prefix: String = id.chars().take(8).collect();
        format!("{prefix}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_signed_in_classification() {
        let err = Error::not_signed_in("any account");
        assert!(err.is_not_signed_in());
        assert!(!err.is_cancelled());
        assert_eq!(err.to_string(), "not signed in to Azure (any account)");
    }

    #[test]
    fn test_cancelled_classification() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Cancelled.is_not_signed_in());
    }

    #[test]
    fn test_redact_shortens_long_identifiers() {
        assert_eq!(redact("72f988bf-86f1-41af-91ab-2d7cd011db47"), "72f988bf…");
        assert_eq!(redact("short"), "short");
    }
}
