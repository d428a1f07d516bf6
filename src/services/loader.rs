//! Fetches course and sequence metadata into the shared store.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{CourseRef, LoadStatus, SequenceRef};
use crate::domain::ports::CoursewareApi;
use crate::services::position_store::{LoadStart, SequencePositionStore};

/// Drives course and sequence loads.
///
/// A load for an id that is already loaded, or still being loaded by a live
/// caller, is a no-op. A load whose caller went away before it finished is
/// restarted by the next caller. A response for an id that has since been
/// replaced is dropped by the store.
pub struct CoursewareLoader {
    api: Arc<dyn CoursewareApi>,
    store: Arc<SequencePositionStore>,
}

impl CoursewareLoader {
    /// Loader writing into `store`.
    pub fn new(api: Arc<dyn CoursewareApi>, store: Arc<SequencePositionStore>) -> Self {
        Self { api, store }
    }

    /// Load `course` unless it is already the current course. Returns the
    /// resulting status for that course.
    #[instrument(skip(self), fields(course_id = %course))]
    pub async fn load_course(&self, course: &CourseRef) -> DomainResult<LoadStatus> {
        let _ticket = match self.store.begin_course_load(course).await {
            LoadStart::Started(ticket) => ticket,
            LoadStart::Skipped(status) => return Ok(status),
        };
        match self.api.fetch_course(course).await {
            Ok(outline) => {
                let sequences = outline.sequences.len();
                if self.store.finish_course_load(outline).await {
                    info!(sequences, "course loaded");
                }
            }
            Err(err) => {
                warn!(error = %err, "course load failed");
                self.store.fail_course_load(course).await;
                if !err.is_not_found() {
                    return Err(err);
                }
            }
        }
        Ok(self.store.snapshot().await.course_status_for(course))
    }

    /// Load `sequence` unless it is already the current sequence.
    #[instrument(skip(self), fields(sequence_id = %sequence))]
    pub async fn load_sequence(&self, sequence: &SequenceRef) -> DomainResult<LoadStatus> {
        let _ticket = match self.store.begin_sequence_load(sequence).await {
            LoadStart::Started(ticket) => ticket,
            LoadStart::Skipped(status) => return Ok(status),
        };
        match self.api.fetch_sequence(sequence).await {
            Ok(metadata) => {
                let units = metadata.units.len();
                if self.store.finish_sequence_load(metadata).await {
                    info!(units, "sequence loaded");
                }
            }
            Err(err) => {
                warn!(error = %err, "sequence load failed");
                self.store.fail_sequence_load(sequence).await;
                if !err.is_not_found() {
                    return Err(err);
                }
            }
        }
        Ok(self.store.snapshot().await.sequence_status_for(sequence))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::adapters::mock::RecordingCoursewareApi;
    use crate::domain::models::UnitRef;
    use crate::domain::ports::{CourseOutline, SequenceMetadata};

    /// Hangs on the first course fetch, then answers normally.
    struct StallsOnce {
        inner: RecordingCoursewareApi,
        stalled: AtomicBool,
    }

    #[async_trait]
    impl CoursewareApi for StallsOnce {
        async fn fetch_course(&self, course: &CourseRef) -> DomainResult<CourseOutline> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.inner.fetch_course(course).await
        }

        async fn fetch_sequence(&self, sequence: &SequenceRef) -> DomainResult<SequenceMetadata> {
            self.inner.fetch_sequence(sequence).await
        }

        async fn check_completion(
            &self,
            course: &CourseRef,
            sequence: &SequenceRef,
            unit: &UnitRef,
        ) -> DomainResult<bool> {
            self.inner.check_completion(course, sequence, unit).await
        }
    }

    #[tokio::test]
    async fn test_load_course_once() {
        let api = Arc::new(RecordingCoursewareApi::with_course("c1", &[("s1", &["u1", "u2"])]));
        let store = Arc::new(SequencePositionStore::new());
        let loader = CoursewareLoader::new(api.clone(), Arc::clone(&store));

        let course = CourseRef::new("c1");
        assert_eq!(loader.load_course(&course).await.unwrap(), LoadStatus::Loaded);
        assert_eq!(loader.load_course(&course).await.unwrap(), LoadStatus::Loaded);
        assert_eq!(api.course_fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_load_is_retried() {
        let api = Arc::new(StallsOnce {
            inner: RecordingCoursewareApi::with_course("c1", &[("s1", &["u1"])]),
            stalled: AtomicBool::new(false),
        });
        let store = Arc::new(SequencePositionStore::new());
        let loader = CoursewareLoader::new(api, Arc::clone(&store));
        let course = CourseRef::new("c1");

        let abandoned = tokio::time::timeout(Duration::from_millis(20), loader.load_course(&course)).await;
        assert!(abandoned.is_err());
        assert_eq!(store.snapshot().await.course_status_for(&course), LoadStatus::Loading);

        assert_eq!(loader.load_course(&course).await.unwrap(), LoadStatus::Loaded);
    }

    #[tokio::test]
    async fn test_unknown_course_marks_failed() {
        let api = Arc::new(RecordingCoursewareApi::new());
        let store = Arc::new(SequencePositionStore::new());
        let loader = CoursewareLoader::new(api, Arc::clone(&store));

        let status = loader.load_course(&CourseRef::new("missing")).await.unwrap();
        assert_eq!(status, LoadStatus::Failed);
    }

    #[tokio::test]
    async fn test_load_sequence_populates_units() {
        let api = Arc::new(RecordingCoursewareApi::with_course("c1", &[("s1", &["u1", "u2"])]));
        let store = Arc::new(SequencePositionStore::new());
        let loader = CoursewareLoader::new(api, Arc::clone(&store));

        loader.load_course(&CourseRef::new("c1")).await.unwrap();
        let status = loader.load_sequence(&SequenceRef::new("s1")).await.unwrap();
        assert_eq!(status, LoadStatus::Loaded);

        let state = store.snapshot().await;
        assert_eq!(state.sequence(&SequenceRef::new("s1")).unwrap().unit_ids.len(), 2);
        assert!(state.unit(&crate::domain::models::UnitRef::new("u2")).is_some());
    }
}
