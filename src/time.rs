use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wall-clock source used for message timestamps and cancellable waits.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Completes after `duration` or as soon as `token` is cancelled.
    fn delay(&self, duration: Duration, token: CancellationToken) -> BoxFuture<'static, ()>;
}

/// UTC system clock with tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn delay(&self, duration: Duration, token: CancellationToken) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = token.cancelled() => {}
            }
        })
    }
}
