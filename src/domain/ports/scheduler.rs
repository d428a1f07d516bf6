use async_trait::async_trait;
use std::time::Duration;

/// Timer abstraction for poll delays, so tests can drive time explicitly.
#[async_trait]
pub trait PollScheduler: Send + Sync {
    /// Resolve after `duration` has elapsed.
    async fn delay(&self, duration: Duration);
}

/// Production scheduler backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl PollScheduler for TokioScheduler {
    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
