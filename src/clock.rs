use std::time::{Duration, Instant};

/// Time source injected into everything that schedules work.
///
/// All backoff sleeps and deadline math go through this trait so the
/// session state machine can be driven in tests without real timers.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    /// Current monotonic time
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer.
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
