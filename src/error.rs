//! Error types for the matchday engine
//!
//! Library operations return [`MatchdayError`] so callers can map each kind to
//! their own surface (HTTP status, CLI exit code). Configuration loading and the
//! binary use `anyhow` on top of this.

use crate::votes::progress::VoteProgressSnapshot;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MatchdayError>;

/// Error taxonomy shared by every engine operation
#[derive(Debug, thiserror::Error)]
pub enum MatchdayError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Settlement already applied, a state transition is not allowed, or a
    /// full-vote requirement is unmet. The snapshot is attached for the latter.
    #[error("Conflict: {reason}")]
    Conflict {
        reason: String,
        progress: Option<Box<VoteProgressSnapshot>>,
    },

    /// Suggestion provider failure. Always recovered by the assignment engine.
    #[error("Upstream unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl MatchdayError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
            progress: None,
        }
    }

    pub fn upstream(reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Conflict carrying the progress snapshot that explains it
    pub fn incomplete_votes(progress: VoteProgressSnapshot) -> Self {
        Self::Conflict {
            reason: "not every expected voter has voted on every player".to_string(),
            progress: Some(Box::new(progress)),
        }
    }

    /// Short machine-friendly name, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            MatchdayError::InvalidInput { .. } => "invalid_input",
            MatchdayError::NotFound { .. } => "not_found",
            MatchdayError::Forbidden { .. } => "forbidden",
            MatchdayError::Conflict { .. } => "conflict",
            MatchdayError::UpstreamUnavailable { .. } => "upstream_unavailable",
            MatchdayError::Internal { .. } => "internal",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, MatchdayError::Conflict { .. })
    }
}
