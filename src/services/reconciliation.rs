//! Completion reconciliation for gated embedded activities.
//!
//! The embedded frame tells us a learner submitted an attempt, but the frame
//! is not the source of truth: the LMS progress record is. On each submit
//! notification the engine fetches a baseline snapshot, then polls a bounded
//! number of times until `is_passing` moves away from that baseline, and
//! finally publishes the last observed snapshot as `Resolved`.
//!
//! Concurrency rules:
//! - One engine per displayed unit; it owns its [`ReconciliationStatus`].
//! - A newer notification supersedes the in-flight round. The old round's
//!   token is cancelled and its generation goes stale, so nothing it
//!   produces afterwards is published.
//! - Disposal cancels every pending fetch and timer. Every mutation after a
//!   suspension point checks the round's generation and token first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CompletionDisplay, CompletionNotification, CourseRef, ProgressSnapshot, ReconciliationConfig,
    ReconciliationState, ReconciliationStatus, UnitRef,
};
use crate::domain::ports::{PollScheduler, ProgressClient};
use crate::services::frame_bus::FrameListener;
use crate::services::presentation;

/// Poll bound and spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationPolicy {
    /// Polls after the baseline fetch.
    pub max_poll_attempts: u32,
    /// Delay before each poll.
    pub poll_delay: Duration,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            max_poll_attempts: 3,
            poll_delay: Duration::from_secs(1),
        }
    }
}

impl From<&ReconciliationConfig> for ReconciliationPolicy {
    fn from(config: &ReconciliationConfig) -> Self {
        Self {
            max_poll_attempts: config.max_poll_attempts,
            poll_delay: config.poll_delay(),
        }
    }
}

/// Status channel plus the generation counter that decides which round
/// may still write to it.
#[derive(Debug)]
struct Shared {
    status: watch::Sender<ReconciliationStatus>,
    generation: AtomicU64,
}

impl Shared {
    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn last_snapshot(&self) -> Option<ProgressSnapshot> {
        self.status.borrow().snapshot
    }

    fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn stamp(status: &mut ReconciliationStatus) {
        status.revision += 1;
        status.updated_at = Some(Utc::now());
    }

    /// Start a new round, invalidating every older one, and publish its
    /// opening status. The generation moves under the channel's write lock
    /// so no older round can interleave a write between the two.
    fn start_round(&self, update: impl FnOnce(&mut ReconciliationStatus)) -> u64 {
        let mut generation = 0;
        self.status.send_modify(|status| {
            generation = self.advance();
            status.generation = generation;
            update(status);
            Self::stamp(status);
        });
        generation
    }

    /// Invalidate every round without publishing anything.
    fn retire(&self) {
        self.status.send_if_modified(|_| {
            self.advance();
            false
        });
    }

    /// Publish only if `generation` is still the live round and the round
    /// has not been cancelled. The check runs under the channel's write
    /// lock, so a round superseded concurrently can never land a write.
    fn publish_if_current(
        &self,
        generation: u64,
        token: &CancellationToken,
        update: impl FnOnce(&mut ReconciliationStatus),
    ) -> DomainResult<()> {
        let mut stale = None;
        self.status.send_if_modified(|status| {
            let current = self.current_generation();
            if token.is_cancelled() || current != generation {
                stale = Some(current);
                return false;
            }
            update(status);
            Self::stamp(status);
            true
        });
        match stale {
            Some(current) => Err(DomainError::StaleCallback {
                generation,
                current,
            }),
            None => Ok(()),
        }
    }
}

struct Round {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Everything a spawned round needs.
struct RoundContext {
    generation: u64,
    round_id: Uuid,
    course: CourseRef,
    token: CancellationToken,
    shared: Arc<Shared>,
    progress: Arc<dyn ProgressClient>,
    scheduler: Arc<dyn PollScheduler>,
    policy: ReconciliationPolicy,
}

impl RoundContext {
    /// Fetch progress unless the round is cancelled first.
    async fn fetch(&self) -> Option<DomainResult<ProgressSnapshot>> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            result = self.progress.fetch_progress(&self.course) => Some(result),
        }
    }

    /// Wait out the poll delay unless the round is cancelled first.
    async fn delay(&self) -> Option<()> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            () = self.scheduler.delay(self.policy.poll_delay) => Some(()),
        }
    }

    fn publish(&self, update: impl FnOnce(&mut ReconciliationStatus)) -> Option<()> {
        match self.shared.publish_if_current(self.generation, &self.token, update) {
            Ok(()) => Some(()),
            Err(err) => {
                debug!(round_id = %self.round_id, error = %err, "discarding stale reconciliation result");
                None
            }
        }
    }

    async fn run(self) {
        let _ = self.reconcile().await;
    }

    async fn reconcile(&self) -> Option<()> {
        let fallback = self.shared.last_snapshot().unwrap_or_default();
        let (baseline, baseline_observed) = match self.fetch().await? {
            Ok(snapshot) => (snapshot, true),
            Err(err) => {
                warn!(course_id = %self.course, error = %err, "baseline progress fetch failed");
                (fallback, false)
            }
        };
        self.publish(|status| {
            status.state = ReconciliationState::AwaitingConvergence {
                baseline,
                attempts: 0,
            };
            if baseline_observed {
                status.snapshot = Some(baseline);
            }
        })?;

        let mut last = baseline;
        for attempt in 1..=self.policy.max_poll_attempts {
            self.delay().await?;
            let observed = match self.fetch().await? {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    warn!(
                        course_id = %self.course,
                        attempt,
                        error = %err,
                        "progress poll failed, counting as non-convergent"
                    );
                    None
                }
            };
            if let Some(snapshot) = observed {
                last = snapshot;
            }
            self.publish(|status| {
                status.state = ReconciliationState::AwaitingConvergence { baseline, attempts: attempt };
                if observed.is_some() {
                    status.snapshot = observed;
                }
            })?;
            if observed.is_some_and(|snapshot| snapshot.is_passing != baseline.is_passing) {
                debug!(attempt, is_passing = last.is_passing, "progress converged");
                break;
            }
        }

        self.publish(|status| {
            status.state = ReconciliationState::Resolved { snapshot: last };
        })?;
        info!(
            course_id = %self.course,
            is_passing = last.is_passing,
            certificate_available = last.certificate_available,
            "completion reconciled"
        );
        Some(())
    }
}

/// Reconciles completion notifications for one displayed unit.
pub struct ReconciliationEngine {
    course: CourseRef,
    unit: UnitRef,
    progress: Arc<dyn ProgressClient>,
    scheduler: Arc<dyn PollScheduler>,
    policy: ReconciliationPolicy,
    shared: Arc<Shared>,
    token: CancellationToken,
    round: Option<Round>,
}

impl ReconciliationEngine {
    /// Engine for `unit` in `course`. Nothing runs until [`spawn`](Self::spawn).
    pub fn new(
        course: CourseRef,
        unit: UnitRef,
        progress: Arc<dyn ProgressClient>,
        scheduler: Arc<dyn PollScheduler>,
        policy: ReconciliationPolicy,
    ) -> Self {
        let (status, _) = watch::channel(ReconciliationStatus::default());
        Self {
            course,
            unit,
            progress,
            scheduler,
            policy,
            shared: Arc::new(Shared {
                status,
                generation: AtomicU64::new(0),
            }),
            token: CancellationToken::new(),
            round: None,
        }
    }

    /// Seed the status with what is already known, such as an issued
    /// certificate from course metadata.
    #[must_use]
    pub fn with_initial_snapshot(self, snapshot: ProgressSnapshot) -> Self {
        self.shared.status.send_modify(|status| status.snapshot = Some(snapshot));
        self
    }

    /// Start consuming `listener` on a background task.
    pub fn spawn(self, listener: FrameListener) -> ReconciliationHandle {
        let status = self.shared.status.subscribe();
        let token = self.token.clone();
        let unit = self.unit.clone();
        let span = tracing::info_span!("reconciliation", course_id = %self.course, unit_id = %self.unit);
        let task = tokio::spawn(self.run(listener).instrument(span));
        ReconciliationHandle {
            unit,
            status,
            token,
            task: Some(task),
        }
    }

    async fn run(mut self, mut listener: FrameListener) {
        let mut listening = true;
        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => break,
                message = listener.recv(), if listening => match message {
                    Some(raw) => {
                        if let Err(err) = self.handle_message(&raw) {
                            debug!(error = %err, "ignoring frame message");
                        }
                    }
                    None => listening = false,
                },
            }
        }
        self.teardown().await;
        drop(listener);
    }

    /// Handle one raw frame message. Returns the generation of the round
    /// it started.
    fn handle_message(&mut self, raw: &Value) -> DomainResult<u64> {
        let notification = CompletionNotification::from_message(raw)?;
        Ok(self.begin(notification))
    }

    fn begin(&mut self, notification: CompletionNotification) -> u64 {
        if let Some(previous) = self.round.take() {
            previous.token.cancel();
            debug!(generation = previous.generation, "superseding in-flight reconciliation");
        }

        let generation = self.shared.start_round(|status| {
            status.attempts_used = Some(notification.attempts_used);
            status.submit_allowed = Some(notification.submit_allowed);
            status.state = ReconciliationState::AwaitingConvergence {
                baseline: status.snapshot.unwrap_or_default(),
                attempts: 0,
            };
        });

        let token = self.token.child_token();
        let round_id = Uuid::new_v4();
        let context = RoundContext {
            generation,
            round_id,
            course: self.course.clone(),
            token: token.clone(),
            shared: Arc::clone(&self.shared),
            progress: Arc::clone(&self.progress),
            scheduler: Arc::clone(&self.scheduler),
            policy: self.policy,
        };
        let span = tracing::debug_span!("round", %round_id, generation);
        let handle = tokio::spawn(context.run().instrument(span));
        info!(
            generation,
            attempts_used = notification.attempts_used,
            submit_allowed = notification.submit_allowed,
            "submit notification received"
        );
        self.round = Some(Round {
            generation,
            token,
            handle,
        });
        generation
    }

    async fn teardown(&mut self) {
        self.token.cancel();
        self.shared.retire();
        if let Some(round) = self.round.take() {
            if let Err(err) = round.handle.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "reconciliation round panicked");
                }
            }
        }
        debug!(unit_id = %self.unit, "reconciliation engine disposed");
    }
}

/// Owner-side handle to a running engine. Dropping it cancels the engine;
/// [`dispose`](Self::dispose) also waits for teardown to finish.
#[derive(Debug)]
pub struct ReconciliationHandle {
    unit: UnitRef,
    status: watch::Receiver<ReconciliationStatus>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ReconciliationHandle {
    /// Unit the engine reconciles.
    pub fn unit(&self) -> &UnitRef {
        &self.unit
    }

    /// Current status.
    pub fn status(&self) -> ReconciliationStatus {
        self.status.borrow().clone()
    }

    /// Current user-visible completion message.
    pub fn display(&self) -> CompletionDisplay {
        presentation::project_status(&self.status.borrow())
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<ReconciliationStatus> {
        self.status.clone()
    }

    /// Wait until the status satisfies `predicate`. Returns `None` if the
    /// engine was disposed first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ReconciliationStatus) -> bool,
    ) -> Option<ReconciliationStatus> {
        let mut status = self.status.clone();
        status.wait_for(predicate).await.ok().map(|s| s.clone())
    }

    /// True once disposal has been requested.
    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel everything in flight and wait for the engine to stop.
    pub async fn dispose(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "reconciliation engine panicked");
                }
            }
        }
    }
}

impl Drop for ReconciliationHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
