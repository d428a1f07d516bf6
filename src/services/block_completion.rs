//! Completion checks for units the learner navigates away from.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::models::{CourseRef, SequenceRef, UnitRef};
use crate::domain::ports::CoursewareApi;
use crate::services::position_store::SequencePositionStore;

/// Checks completion of units the learner leaves.
pub struct BlockCompletionChecker {
    api: Arc<dyn CoursewareApi>,
    store: Arc<SequencePositionStore>,
}

impl BlockCompletionChecker {
    /// Checker asking `api` and recording in `store`.
    pub fn new(api: Arc<dyn CoursewareApi>, store: Arc<SequencePositionStore>) -> Self {
        Self { api, store }
    }

    /// Ask the LMS whether `unit` is now complete and record it locally.
    ///
    /// Units already known complete are not re-checked. Failures are
    /// logged and reported as incomplete.
    pub async fn check(&self, course: &CourseRef, sequence: &SequenceRef, unit: &UnitRef) -> bool {
        let state = self.store.snapshot().await;
        match state.unit(unit) {
            Some(record) if record.complete => return true,
            Some(_) => {}
            None => {
                debug!(unit_id = %unit, "completion check for unknown unit skipped");
                return false;
            }
        }

        match self.api.check_completion(course, sequence, unit).await {
            Ok(true) => {
                self.store.mark_complete(unit).await;
                debug!(unit_id = %unit, "unit marked complete");
                true
            }
            Ok(false) => false,
            Err(err) => {
                warn!(unit_id = %unit, error = %err, "completion check failed");
                false
            }
        }
    }
}
