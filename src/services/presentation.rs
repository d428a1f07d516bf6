//! Maps reconciliation state to the message shown next to a gated activity.

use crate::domain::models::{
    CompletionDisplay, ProgressSnapshot, ReconciliationState, ReconciliationStatus,
};

/// Pure projection. Certificates outrank everything else; failure messages
/// need a resolved snapshot and a known attempt count.
pub fn project(
    state: &ReconciliationState,
    snapshot: Option<&ProgressSnapshot>,
    attempts_used: Option<u32>,
) -> CompletionDisplay {
    if state.is_awaiting() {
        return CompletionDisplay::Checking;
    }
    let Some(snapshot) = snapshot else {
        return CompletionDisplay::None;
    };
    if snapshot.certificate_available || snapshot.is_passing {
        return CompletionDisplay::Success;
    }
    match attempts_used {
        Some(attempts) if attempts >= 2 => CompletionDisplay::FailureFinal,
        Some(1) => CompletionDisplay::FailureRetryAvailable,
        _ => CompletionDisplay::None,
    }
}

/// [`project`] over a published status.
pub fn project_status(status: &ReconciliationStatus) -> CompletionDisplay {
    project(&status.state, status.snapshot.as_ref(), status.attempts_used)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(snapshot: ProgressSnapshot) -> ReconciliationState {
        ReconciliationState::Resolved { snapshot }
    }

    #[test]
    fn test_checking_while_awaiting() {
        let state = ReconciliationState::AwaitingConvergence {
            baseline: ProgressSnapshot::failing(),
            attempts: 1,
        };
        let snapshot = ProgressSnapshot::new(true, true);
        assert_eq!(project(&state, Some(&snapshot), Some(1)), CompletionDisplay::Checking);
    }

    #[test]
    fn test_certificate_outranks_failure() {
        let snapshot = ProgressSnapshot::new(false, true);
        assert_eq!(
            project(&resolved(snapshot), Some(&snapshot), Some(5)),
            CompletionDisplay::Success
        );
    }

    #[test]
    fn test_failure_by_attempts() {
        let snapshot = ProgressSnapshot::failing();
        let state = resolved(snapshot);
        assert_eq!(project(&state, Some(&snapshot), Some(2)), CompletionDisplay::FailureFinal);
        assert_eq!(project(&state, Some(&snapshot), Some(7)), CompletionDisplay::FailureFinal);
        assert_eq!(
            project(&state, Some(&snapshot), Some(1)),
            CompletionDisplay::FailureRetryAvailable
        );
        assert_eq!(project(&state, Some(&snapshot), Some(0)), CompletionDisplay::None);
        assert_eq!(project(&state, Some(&snapshot), None), CompletionDisplay::None);
    }

    #[test]
    fn test_nothing_observed() {
        assert_eq!(
            project(&ReconciliationState::Idle, None, Some(2)),
            CompletionDisplay::None
        );
        assert_eq!(project_status(&ReconciliationStatus::default()), CompletionDisplay::None);
    }

    #[test]
    fn test_idle_with_seeded_certificate() {
        let status = ReconciliationStatus {
            snapshot: Some(ProgressSnapshot::new(false, true)),
            ..Default::default()
        };
        assert_eq!(project_status(&status), CompletionDisplay::Success);
    }
}
