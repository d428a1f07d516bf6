//! Domain errors for courseware navigation and completion reconciliation.

use thiserror::Error;

use super::models::{CourseRef, SequenceRef, UnitRef};

/// Domain-level errors that can occur while navigating courseware.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The LMS does not know this course.
    #[error("Course not found: {0}")]
    CourseNotFound(CourseRef),

    /// The LMS does not know this sequence.
    #[error("Sequence not found: {0}")]
    SequenceNotFound(SequenceRef),

    /// The unit is not part of its sequence.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitRef),

    /// The course has no sequences to enter.
    #[error("Course {0} has no sequences")]
    EmptyCourse(CourseRef),

    /// Network error, timeout or 5xx. Worth retrying later.
    #[error("Transient fetch failure: {0}")]
    TransientFetchFailure(String),

    /// A frame message that is not a submit envelope.
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// A result from a superseded or disposed round.
    #[error("Stale callback for generation {generation} (current {current})")]
    StaleCallback {
        /// Generation the late result belongs to.
        generation: u64,
        /// Generation that is live now.
        current: u64,
    },

    /// The navigator refused a redirect.
    #[error("Navigation blocked: {0}")]
    NavigationBlocked(String),

    /// A state machine was asked to make a move it does not allow.
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        /// State the transition started from.
        from: String,
        /// State it tried to reach.
        to: String,
        /// Why it was refused.
        reason: String,
    },

    /// Configuration or input failed validation.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Result alias used throughout the domain and service layers.
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Returns true for the not-found family, which callers render as a
    /// placeholder rather than an error page.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CourseNotFound(_)
                | Self::SequenceNotFound(_)
                | Self::UnitNotFound(_)
                | Self::EmptyCourse(_)
        )
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedNotification(err.to_string())
    }
}
