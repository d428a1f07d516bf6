//! Embedded-frame completion notifications and authoritative progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Envelope `type` sent by the embedded problem frame.
pub const PROBLEM_CHECK_TYPE: &str = "problem_check";

/// Envelope `action` for a submitted attempt.
pub const SUBMIT_ACTION: &str = "submit";

/// Wire shape of the frame's post-message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEnvelope {
    /// Must be `problem_check`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Must be `submit`.
    pub action: String,
    /// Attempts the learner has used so far.
    pub attempts_used: u32,
    /// Whether the frame still offers another attempt.
    pub should_enable_submit_button: bool,
}

/// A learner submitted a gated attempt. Untrusted and provisional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotification {
    /// Attempts used, as claimed by the frame.
    pub attempts_used: u32,
    /// Another attempt is available.
    pub submit_allowed: bool,
}

impl CompletionNotification {
    /// Decode a raw frame message.
    ///
    /// Anything that is not a `problem_check`/`submit` envelope with both
    /// attempt fields is rejected as malformed.
    pub fn from_message(raw: &serde_json::Value) -> DomainResult<Self> {
        let envelope: FrameEnvelope = serde_json::from_value(raw.clone())?;
        if envelope.kind != PROBLEM_CHECK_TYPE || envelope.action != SUBMIT_ACTION {
            return Err(DomainError::MalformedNotification(format!(
                "unexpected envelope {}/{}",
                envelope.kind, envelope.action
            )));
        }
        Ok(Self {
            attempts_used: envelope.attempts_used,
            submit_allowed: envelope.should_enable_submit_button,
        })
    }

    /// Encode as the envelope the frame would send.
    pub fn to_message(&self) -> serde_json::Value {
        serde_json::json!({
            "type": PROBLEM_CHECK_TYPE,
            "action": SUBMIT_ACTION,
            "attempts_used": self.attempts_used,
            "should_enable_submit_button": self.submit_allowed,
        })
    }
}

/// Authoritative grade state for a learner in a course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// The learner currently has a passing grade.
    pub is_passing: bool,
    /// A certificate has been issued.
    pub certificate_available: bool,
}

impl ProgressSnapshot {
    /// Snapshot from its two flags.
    pub const fn new(is_passing: bool, certificate_available: bool) -> Self {
        Self {
            is_passing,
            certificate_available,
        }
    }

    /// Passing, no certificate yet.
    pub const fn passing() -> Self {
        Self::new(true, false)
    }

    /// Not passing, no certificate.
    pub const fn failing() -> Self {
        Self::new(false, false)
    }
}

/// Lifecycle of one reconciliation engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReconciliationState {
    /// No notification received yet.
    #[default]
    Idle,
    /// Polling until `is_passing` moves away from the baseline.
    AwaitingConvergence {
        /// Snapshot taken when the round started.
        baseline: ProgressSnapshot,
        /// Polls made so far in this round.
        attempts: u32,
    },
    /// The round finished. Shows the last snapshot observed.
    Resolved {
        /// Final verdict of the round.
        snapshot: ProgressSnapshot,
    },
}

impl ReconciliationState {
    /// Stable snake_case name for logs and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingConvergence { .. } => "awaiting_convergence",
            Self::Resolved { .. } => "resolved",
        }
    }

    /// True while a round is polling.
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::AwaitingConvergence { .. })
    }
}

/// What an engine publishes after every state mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationStatus {
    /// Where the current round stands.
    pub state: ReconciliationState,
    /// Provisional attempt count from the latest notification.
    pub attempts_used: Option<u32>,
    /// Provisional submit-button state from the latest notification.
    pub submit_allowed: Option<bool>,
    /// Latest authoritative snapshot actually observed, if any.
    pub snapshot: Option<ProgressSnapshot>,
    /// Notification round the status belongs to (0 before any notification).
    pub generation: u64,
    /// Incremented on every published mutation.
    pub revision: u64,
    /// Time of the last published mutation.
    pub updated_at: Option<DateTime<Utc>>,
}

/// User-visible completion message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionDisplay {
    /// Nothing to show.
    None,
    /// A submission is being confirmed.
    Checking,
    /// Passed, or a certificate is available.
    Success,
    /// Not passing and no attempts left.
    FailureFinal,
    /// Not passing, but another attempt is allowed.
    FailureRetryAvailable,
}

impl CompletionDisplay {
    /// Kebab-case name, matching the serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Checking => "checking",
            Self::Success => "success",
            Self::FailureFinal => "failure-final",
            Self::FailureRetryAvailable => "failure-retry-available",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_submit_envelope() {
        let raw = json!({
            "type": "problem_check",
            "action": "submit",
            "attempts_used": 2,
            "should_enable_submit_button": false,
        });
        let notification = CompletionNotification::from_message(&raw).unwrap();
        assert_eq!(notification.attempts_used, 2);
        assert!(!notification.submit_allowed);
        assert_eq!(notification.to_message(), raw);
    }

    #[test]
    fn test_rejects_other_message_types() {
        let raw = json!({
            "type": "plugin.resize",
            "action": "submit",
            "attempts_used": 1,
            "should_enable_submit_button": true,
        });
        assert!(matches!(
            CompletionNotification::from_message(&raw),
            Err(DomainError::MalformedNotification(_))
        ));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let raw = json!({ "type": "problem_check", "action": "submit" });
        assert!(CompletionNotification::from_message(&raw).is_err());
    }

    #[test]
    fn test_rejects_negative_attempts() {
        let raw = json!({
            "type": "problem_check",
            "action": "submit",
            "attempts_used": -1,
            "should_enable_submit_button": true,
        });
        assert!(CompletionNotification::from_message(&raw).is_err());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(CompletionNotification::from_message(&json!("submit")).is_err());
    }
}
