use thiserror::Error;

/// Run-level failure taxonomy.
///
/// Only `Persistence` and `Config` abort a run; the rest are absorbed into
/// the run summary so a partial digest can still be produced.
#[derive(Debug, Error)]
pub enum PaperwatchError {
    #[error("Source unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Malformed record from {source_name}: {reason}")]
    MalformedRecord { source_name: String, reason: String },

    #[error("Scoring failed for {identity_key}: {reason}")]
    ScoringFailure { identity_key: String, reason: String },

    #[error("No preprint source was reachable this run")]
    AllSourcesFailed,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PaperwatchError {
    /// Fatal errors abort the run with a non-zero outcome; everything else
    /// downgrades to a run-summary entry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PaperwatchError::Persistence(_)
                | PaperwatchError::Config(_)
                | PaperwatchError::Io(_)
                | PaperwatchError::AllSourcesFailed
        )
    }
}

pub type Result<T> = std::result::Result<T, PaperwatchError>;
