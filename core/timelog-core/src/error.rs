//! Error types for timelog-core operations.
//!
//! Domain failures are deterministic input-validation results and are never
//! retried. Storage failures are propagated as-is; the core does not attempt
//! recovery.

use std::path::PathBuf;

/// All errors that can occur in timelog-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TimelogError {
    // ─────────────────────────────────────────────────────────────────────
    // Domain Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid timestamp: {value:?}")]
    InvalidTimestamp { value: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session reference is ambiguous: {0}")]
    AmbiguousSession(String),

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported data file version {found} (this build understands up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Home directory not found")]
    HomeDirNotFound,
}

impl TimelogError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        TimelogError::Validation(message.into())
    }

    /// True for failures caused by caller input rather than the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TimelogError::InvalidTimestamp { .. }
                | TimelogError::Validation(_)
                | TimelogError::NoActiveSession
                | TimelogError::NotFound(_)
                | TimelogError::AmbiguousSession(_)
        )
    }
}

/// Convenience type alias for Results using TimelogError.
pub type Result<T> = std::result::Result<T, TimelogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_classified() {
        assert!(TimelogError::NoActiveSession.is_user_error());
        assert!(TimelogError::validation("end must be after start").is_user_error());
        assert!(!TimelogError::HomeDirNotFound.is_user_error());
    }

    #[test]
    fn test_display_includes_context() {
        let err = TimelogError::Io {
            context: "reading /tmp/x.json".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/x.json"));
        assert!(message.contains("gone"));
    }
}
