use std::path::PathBuf;
use thiserror::Error;

pub type AuthorityResult<T> = Result<T, AuthorityError>;

/// Errors surfaced by the authority gateway.
///
/// Validation outcomes are not errors; they come back as
/// [`ProvenanceVerdict`](crate::ProvenanceVerdict) values.
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("source model unavailable at {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("no entities parsed from {path}")]
    ParseIncomplete { path: PathBuf },

    #[error("authority gateway is not initialized")]
    NotInitialized,

    #[error("authority gateway initialization already in progress")]
    InitializationInProgress,

    #[error("authority gateway initialization failed: {reason}")]
    InitializationFailed { reason: String },

    #[error("invalid gateway configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl AuthorityError {
    pub(crate) fn source_unavailable(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
