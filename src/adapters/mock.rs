//! In-memory test doubles for every port.
//!
//! These back the unit and integration tests and the offline fixtures; none
//! of them perform I/O.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Course, CourseRef, ProgressSnapshot, Redirect, Sequence, SequenceRef, Unit, UnitRef,
};
use crate::domain::ports::{
    CourseOutline, CoursewareApi, Navigator, PollScheduler, PositionClient, ProgressClient,
    SequenceMetadata,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted progress response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockProgress {
    /// Answer with this snapshot.
    Snapshot(ProgressSnapshot),
    /// Fail with a transient error.
    Failure(String),
}

impl MockProgress {
    /// Passing snapshot.
    pub const fn passing() -> Self {
        Self::Snapshot(ProgressSnapshot::passing())
    }

    /// Failing snapshot.
    pub const fn failing() -> Self {
        Self::Snapshot(ProgressSnapshot::failing())
    }

    /// Transient failure with `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    fn into_result(self) -> DomainResult<ProgressSnapshot> {
        match self {
            Self::Snapshot(snapshot) => Ok(snapshot),
            Self::Failure(message) => Err(DomainError::TransientFetchFailure(message)),
        }
    }
}

/// Progress client that replays a script, then repeats a fallback.
pub struct MockProgressClient {
    script: Mutex<VecDeque<MockProgress>>,
    fallback: Mutex<MockProgress>,
    calls: watch::Sender<usize>,
    held: Mutex<Option<MockProgress>>,
    release: Semaphore,
    holds: watch::Sender<usize>,
}

impl MockProgressClient {
    /// Client answering `fallback` to every fetch.
    pub fn new(fallback: MockProgress) -> Self {
        let (calls, _) = watch::channel(0);
        let (holds, _) = watch::channel(0);
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls,
            held: Mutex::new(None),
            release: Semaphore::new(0),
            holds,
        }
    }

    /// Responses are served in order before falling back.
    pub fn scripted(responses: impl IntoIterator<Item = MockProgress>, fallback: MockProgress) -> Self {
        let client = Self::new(fallback);
        lock(&client.script).extend(responses);
        client
    }

    /// Queue one more scripted response.
    pub fn push(&self, response: MockProgress) {
        lock(&self.script).push_back(response);
    }

    /// Change the answer once the script runs out.
    pub fn set_fallback(&self, response: MockProgress) {
        *lock(&self.fallback) = response;
    }

    /// Fetches made so far.
    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    /// Wait until at least `count` fetches have been made.
    pub async fn wait_for_calls(&self, count: usize) {
        let mut calls = self.calls.subscribe();
        let _ = calls.wait_for(|&made| made >= count).await;
    }

    /// The next fetch answers `response`, but only after
    /// [`release_held`](Self::release_held).
    pub fn hold_next(&self, response: MockProgress) {
        *lock(&self.held) = Some(response);
    }

    /// Let a held fetch complete.
    pub fn release_held(&self) {
        self.release.add_permits(1);
    }

    /// Wait until at least `count` fetches have started holding.
    pub async fn wait_for_held(&self, count: usize) {
        let mut holds = self.holds.subscribe();
        let _ = holds.wait_for(|&started| started >= count).await;
    }
}

impl Default for MockProgressClient {
    fn default() -> Self {
        Self::new(MockProgress::failing())
    }
}

#[async_trait]
impl ProgressClient for MockProgressClient {
    async fn fetch_progress(&self, _course: &CourseRef) -> DomainResult<ProgressSnapshot> {
        let held = lock(&self.held).take();
        if let Some(response) = held {
            self.calls.send_modify(|made| *made += 1);
            self.holds.send_modify(|started| *started += 1);
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
            return response.into_result();
        }
        let response = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| lock(&self.fallback).clone());
        self.calls.send_modify(|made| *made += 1);
        response.into_result()
    }
}

/// Scheduler whose delays complete immediately.
#[derive(Debug, Default)]
pub struct ImmediateScheduler {
    delays: AtomicUsize,
}

impl ImmediateScheduler {
    /// Scheduler with no delays recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far.
    pub fn delays(&self) -> usize {
        self.delays.load(Ordering::Acquire)
    }
}

#[async_trait]
impl PollScheduler for ImmediateScheduler {
    async fn delay(&self, _duration: Duration) {
        self.delays.fetch_add(1, Ordering::AcqRel);
        tokio::task::yield_now().await;
    }
}

/// Scheduler whose delays complete only when the test releases them.
pub struct ManualScheduler {
    permits: Semaphore,
    pending: watch::Sender<usize>,
    started: AtomicUsize,
}

struct PendingGuard<'a>(&'a watch::Sender<usize>);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|pending| *pending = pending.saturating_sub(1));
    }
}

impl ManualScheduler {
    /// Scheduler with no permits.
    pub fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            permits: Semaphore::new(0),
            pending,
            started: AtomicUsize::new(0),
        }
    }

    /// Let `count` waiting (or future) delays complete.
    pub fn release(&self, count: usize) {
        self.permits.add_permits(count);
    }

    /// Delays currently waiting.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Delays started over the scheduler's lifetime.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::Acquire)
    }

    /// Wait until at least `count` delays are waiting.
    pub async fn wait_for_pending(&self, count: usize) {
        let mut pending = self.pending.subscribe();
        let _ = pending.wait_for(|&waiting| waiting >= count).await;
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PollScheduler for ManualScheduler {
    async fn delay(&self, _duration: Duration) {
        self.started.fetch_add(1, Ordering::AcqRel);
        self.pending.send_modify(|pending| *pending += 1);
        let _guard = PendingGuard(&self.pending);
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

/// Navigator that records redirects and can be told to refuse them.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<Redirect>>,
    blocked: Mutex<Option<String>>,
}

impl RecordingNavigator {
    /// Navigator accepting every redirect.
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirects accepted so far.
    pub fn redirects(&self) -> Vec<Redirect> {
        lock(&self.redirects).clone()
    }

    /// Locations of accepted redirects.
    pub fn locations(&self) -> Vec<String> {
        lock(&self.redirects).iter().map(Redirect::location).collect()
    }

    /// Refuse every redirect with `reason`.
    pub fn block(&self, reason: impl Into<String>) {
        *lock(&self.blocked) = Some(reason.into());
    }

    /// Accept redirects again.
    pub fn unblock(&self) {
        *lock(&self.blocked) = None;
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, redirect: &Redirect) -> DomainResult<()> {
        if let Some(reason) = lock(&self.blocked).clone() {
            return Err(DomainError::NavigationBlocked(reason));
        }
        lock(&self.redirects).push(redirect.clone());
        Ok(())
    }
}

/// Courseware API backed by fixtures; records position saves and
/// completion checks.
#[derive(Debug, Default)]
pub struct RecordingCoursewareApi {
    courses: Mutex<HashMap<CourseRef, CourseOutline>>,
    sequences: Mutex<HashMap<SequenceRef, SequenceMetadata>>,
    completions: Mutex<HashMap<UnitRef, bool>>,
    saved: Mutex<Vec<(CourseRef, SequenceRef, usize)>>,
    failing: Mutex<Vec<SequenceRef>>,
    course_fetches: AtomicUsize,
    sequence_fetches: AtomicUsize,
    completion_checks: AtomicUsize,
}

impl RecordingCoursewareApi {
    /// API with no courses.
    pub fn new() -> Self {
        Self::default()
    }

    /// One course whose sequences hold the given unit ids. Sequences save
    /// positions; nothing is gated or time-limited.
    pub fn with_course(course: &str, sequences: &[(&str, &[&str])]) -> Self {
        let api = Self::new();
        api.add_course(course, sequences);
        api
    }

    /// Add a course whose sequences hold the given unit ids.
    pub fn add_course(&self, course: &str, sequences: &[(&str, &[&str])]) {
        let course_id = CourseRef::new(course);
        let mut skeletons = Vec::new();
        for (sequence, units) in sequences {
            let sequence_id = SequenceRef::new(*sequence);
            let unit_ids: Vec<UnitRef> = units.iter().copied().map(UnitRef::new).collect();
            let record = Sequence {
                save_position: true,
                ..Sequence::skeleton(sequence_id.clone(), format!("Sequence {sequence}"), unit_ids.clone())
            };
            let units = unit_ids
                .into_iter()
                .map(|id| Unit {
                    title: format!("Unit {id}"),
                    id,
                    sequence_id: sequence_id.clone(),
                    complete: false,
                    gated: false,
                })
                .collect();
            skeletons.push(record.clone());
            lock(&self.sequences).insert(
                sequence_id,
                SequenceMetadata {
                    sequence: record,
                    units,
                },
            );
        }
        let outline = CourseOutline {
            course: Course {
                id: course_id.clone(),
                title: format!("Course {course}"),
                user_has_access: true,
                sequence_ids: skeletons.iter().map(|s| s.id.clone()).collect(),
                certificate_available: false,
            },
            sequences: skeletons,
        };
        lock(&self.courses).insert(course_id, outline);
    }

    /// Edit a course fixture in place.
    pub fn update_course(&self, course: &CourseRef, update: impl FnOnce(&mut Course)) {
        if let Some(outline) = lock(&self.courses).get_mut(course) {
            update(&mut outline.course);
        }
    }

    /// Edit a sequence fixture in place.
    pub fn update_sequence(&self, sequence: &SequenceRef, update: impl FnOnce(&mut SequenceMetadata)) {
        if let Some(metadata) = lock(&self.sequences).get_mut(sequence) {
            update(metadata);
        }
    }

    /// Flag a unit as a gated activity.
    pub fn gate_unit(&self, unit: &UnitRef) {
        for metadata in lock(&self.sequences).values_mut() {
            for record in metadata.units.iter_mut().filter(|u| &u.id == unit) {
                record.gated = true;
            }
        }
    }

    /// Make fetches of `sequence` fail transiently.
    pub fn fail_sequence(&self, sequence: &SequenceRef) {
        lock(&self.failing).push(sequence.clone());
    }

    /// Completion answer for `unit`.
    pub fn set_completion(&self, unit: &UnitRef, complete: bool) {
        lock(&self.completions).insert(unit.clone(), complete);
    }

    /// Position saves received, in order.
    pub fn saved_positions(&self) -> Vec<(CourseRef, SequenceRef, usize)> {
        lock(&self.saved).clone()
    }

    /// Course fetches so far.
    pub fn course_fetches(&self) -> usize {
        self.course_fetches.load(Ordering::Acquire)
    }

    /// Sequence fetches so far.
    pub fn sequence_fetches(&self) -> usize {
        self.sequence_fetches.load(Ordering::Acquire)
    }

    /// Completion checks so far.
    pub fn completion_checks(&self) -> usize {
        self.completion_checks.load(Ordering::Acquire)
    }
}

#[async_trait]
impl CoursewareApi for RecordingCoursewareApi {
    async fn fetch_course(&self, course: &CourseRef) -> DomainResult<CourseOutline> {
        self.course_fetches.fetch_add(1, Ordering::AcqRel);
        lock(&self.courses)
            .get(course)
            .cloned()
            .ok_or_else(|| DomainError::CourseNotFound(course.clone()))
    }

    async fn fetch_sequence(&self, sequence: &SequenceRef) -> DomainResult<SequenceMetadata> {
        self.sequence_fetches.fetch_add(1, Ordering::AcqRel);
        if lock(&self.failing).contains(sequence) {
            return Err(DomainError::TransientFetchFailure(format!(
                "sequence {sequence} unavailable"
            )));
        }
        lock(&self.sequences)
            .get(sequence)
            .cloned()
            .ok_or_else(|| DomainError::SequenceNotFound(sequence.clone()))
    }

    async fn check_completion(
        &self,
        _course: &CourseRef,
        _sequence: &SequenceRef,
        unit: &UnitRef,
    ) -> DomainResult<bool> {
        self.completion_checks.fetch_add(1, Ordering::AcqRel);
        Ok(lock(&self.completions).get(unit).copied().unwrap_or(false))
    }
}

#[async_trait]
impl PositionClient for RecordingCoursewareApi {
    async fn save_position(
        &self,
        course: &CourseRef,
        sequence: &SequenceRef,
        unit_index: usize,
    ) -> DomainResult<()> {
        lock(&self.saved).push((course.clone(), sequence.clone(), unit_index));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_script_then_fallback() {
        let client = MockProgressClient::scripted(
            [MockProgress::passing(), MockProgress::failure("boom")],
            MockProgress::failing(),
        );
        let course = CourseRef::new("c1");
        assert!(client.fetch_progress(&course).await.unwrap().is_passing);
        assert!(client.fetch_progress(&course).await.is_err());
        assert!(!client.fetch_progress(&course).await.unwrap().is_passing);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_manual_scheduler_holds_until_released() {
        let scheduler = std::sync::Arc::new(ManualScheduler::new());
        let waiter = {
            let scheduler = std::sync::Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.delay(Duration::from_secs(1)).await })
        };
        scheduler.wait_for_pending(1).await;
        assert_eq!(scheduler.pending(), 1);

        scheduler.release(1);
        waiter.await.unwrap();
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.started(), 1);
    }

    #[test]
    fn test_blocked_navigator() {
        let navigator = RecordingNavigator::new();
        navigator.block("host refused");
        let redirect = Redirect::internal(crate::domain::models::NavigationTarget::course(
            CourseRef::new("c1"),
        ));
        assert!(matches!(
            navigator.navigate(&redirect),
            Err(DomainError::NavigationBlocked(_))
        ));
        assert!(navigator.redirects().is_empty());
    }
}
