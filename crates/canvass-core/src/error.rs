//! Error types for the Canvass core.

use crate::oracle::OracleError;
use thiserror::Error;

/// A shared error type for the Canvass interview core.
///
/// Adaptive sequencing prefers graceful degradation over failure (an
/// interview must always be completable), so most oracle trouble is
/// absorbed locally and never reaches this type. Aggregation and
/// classification prefer explicit failure over silently wrong output,
/// since their results feed hiring decisions.
#[derive(Error, Debug)]
pub enum CanvassError {
    /// Unknown session id; surfaced to the caller, never retried.
    #[error("Session not found: '{id}'")]
    SessionNotFound { id: String },

    /// Answer submitted after completion or for an already-satisfied slot.
    /// The session state is unchanged.
    #[error("Invalid state transition: {reason}")]
    InvalidTransition { reason: String },

    /// Skill-depth sequencing needs at least three candidate skills.
    /// Fatal at session-start time, not recoverable.
    #[error("Insufficient skill candidates: need at least 3, found {found}")]
    InsufficientCandidates { found: usize },

    /// Perspective aggregation invoked with zero respondents.
    #[error("Perspective aggregation requires at least one respondent")]
    InsufficientRespondents,

    /// The oracle failed and no local fallback exists for the slot.
    #[error("Oracle unavailable for {context}: {source}")]
    OracleUnavailable {
        context: &'static str,
        source: OracleError,
    },

    /// Oracle failure in a context that prefers explicit failure
    /// (synthesis, classification) over a degraded result.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// The caller aborted mid-transition; the session kept its
    /// pre-call state.
    #[error("Operation cancelled before the transition committed")]
    Cancelled,

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CanvassError {
    /// Creates a SessionNotFound error.
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::SessionNotFound { id: id.into() }
    }

    /// Creates an InvalidTransition error.
    pub fn invalid_transition(reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            reason: reason.into(),
        }
    }

    /// Creates an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a SessionNotFound error.
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound { .. })
    }

    /// Check if this is an InvalidTransition error.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

impl From<serde_json::Error> for CanvassError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A type alias for `Result<T, CanvassError>`.
pub type Result<T> = std::result::Result<T, CanvassError>;
