//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use courseware::adapters::mock::{
    ImmediateScheduler, ManualScheduler, MockProgress, MockProgressClient, RecordingCoursewareApi,
    RecordingNavigator,
};
use courseware::domain::models::{
    CompletionNotification, Config, CourseRef, ReconciliationState, ReconciliationStatus, UnitRef,
};
use courseware::domain::ports::PollScheduler;
use courseware::services::{
    CoursewareSession, FrameMessageBus, ReconciliationEngine, ReconciliationHandle,
    ReconciliationPolicy, SessionPorts,
};
use serde_json::Value;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Frame envelope for a submitted attempt.
pub fn submit(attempts_used: u32, submit_allowed: bool) -> Value {
    CompletionNotification {
        attempts_used,
        submit_allowed,
    }
    .to_message()
}

/// Await `future`, failing the test if it takes longer than [`TIMEOUT`].
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(TIMEOUT, future)
        .await
        .expect("timed out waiting")
}

/// Poll `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
}

pub async fn resolved(handle: &ReconciliationHandle) -> ReconciliationStatus {
    within(handle.wait_for(|s| matches!(s.state, ReconciliationState::Resolved { .. })))
        .await
        .expect("engine disposed before resolving")
}

/// Engine for course `c1` / unit `exam`, attached to a fresh bus.
pub fn engine(
    progress: Arc<MockProgressClient>,
    scheduler: Arc<dyn PollScheduler>,
) -> (FrameMessageBus, ReconciliationHandle) {
    let bus = FrameMessageBus::new();
    let handle = ReconciliationEngine::new(
        CourseRef::new("c1"),
        UnitRef::new("exam"),
        progress,
        scheduler,
        ReconciliationPolicy::default(),
    )
    .spawn(bus.attach());
    (bus, handle)
}

/// Course `c1`: `s1` = [u1, u2, u3], `s2` = [u4], `s3` = [u5, u6].
pub fn demo_api() -> RecordingCoursewareApi {
    RecordingCoursewareApi::with_course(
        "c1",
        &[("s1", &["u1", "u2", "u3"]), ("s2", &["u4"]), ("s3", &["u5", "u6"])],
    )
}

/// Session wired to in-memory doubles.
pub struct Harness {
    pub api: Arc<RecordingCoursewareApi>,
    pub progress: Arc<MockProgressClient>,
    pub navigator: Arc<RecordingNavigator>,
    pub scheduler: Arc<ImmediateScheduler>,
    pub manual: Arc<ManualScheduler>,
}

impl Harness {
    pub fn new(api: RecordingCoursewareApi) -> Self {
        Self {
            api: Arc::new(api),
            progress: Arc::new(MockProgressClient::new(MockProgress::failing())),
            navigator: Arc::new(RecordingNavigator::new()),
            scheduler: Arc::new(ImmediateScheduler::new()),
            manual: Arc::new(ManualScheduler::new()),
        }
    }

    pub fn ports(&self) -> SessionPorts {
        SessionPorts {
            courseware: self.api.clone(),
            positions: self.api.clone(),
            progress: self.progress.clone(),
            navigator: self.navigator.clone(),
            scheduler: self.scheduler.clone(),
        }
    }

    pub fn session(&self) -> CoursewareSession {
        CoursewareSession::new(self.ports(), &Config::default())
    }

    /// Session whose poll delays wait for [`ManualScheduler::release`].
    pub fn manual_session(&self) -> CoursewareSession {
        let ports = SessionPorts {
            scheduler: self.manual.clone(),
            ..self.ports()
        };
        CoursewareSession::new(ports, &Config::default())
    }
}
