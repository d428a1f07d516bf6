use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CourseRef, ProgressSnapshot};

/// Port for the authoritative grade/progress record.
///
/// Implementations do not retry; the reconciliation poll is the only retry
/// loop around this call.
#[async_trait]
pub trait ProgressClient: Send + Sync {
    /// Fetch the learner's current progress for a course.
    async fn fetch_progress(&self, course: &CourseRef) -> DomainResult<ProgressSnapshot>;
}
