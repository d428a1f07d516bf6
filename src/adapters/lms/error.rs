use thiserror::Error;

use crate::domain::errors::DomainError;

/// Errors talking to the LMS.
#[derive(Error, Debug)]
pub enum LmsError {
    /// Connection, TLS or timeout failure
    #[error("LMS request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("LMS returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Response body did not match the expected shape
    #[error("Failed to decode LMS response: {0}")]
    Decode(String),
}

impl LmsError {
    /// Returns true if the same request may succeed later.
    ///
    /// Network failures, 429 and 5xx are transient; other statuses and
    /// decode failures are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) => false,
        }
    }

    /// The LMS does not know the requested id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<LmsError> for DomainError {
    fn from(err: LmsError) -> Self {
        let kind = if err.is_transient() { "transient" } else { "permanent" };
        Self::TransientFetchFailure(format!("{err} ({kind})"))
    }
}
