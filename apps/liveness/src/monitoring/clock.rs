use chrono::{DateTime, Utc};
use std::time::Duration;

/// Time source used by probe tasks.
///
/// Delays and event timestamps go through this so tests can substitute a
/// deterministic implementation.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);

    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the tokio timer and the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait::async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
