//! Non-blocking publish handle and the background drain loop behind it.
//!
//! [`EventBus::publish`] only enqueues. [`EventBusService::run`] wakes on a
//! fixed interval, sends everything that was queued at that moment through
//! the [`ProducerCore`], and on shutdown flushes the producer until the
//! broker has acknowledged everything (or the flush is cancelled).
//!
//! The queue is unbounded: `publish` never blocks and never fails because
//! the queue is full. A producer that cannot keep up with publishers grows
//! memory without limit.

use crate::producer::ProducerCore;
use crate::{Error, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

struct QueuedMessage<K, V> {
    key: K,
    value: V,
}

/// Cloneable publish handle. Publishing is FIFO per handle.
pub struct EventBus<K, V> {
    tx: mpsc::UnboundedSender<QueuedMessage<K, V>>,
    topic: Arc<str>,
}

impl<K, V> Clone for EventBus<K, V> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            topic: Arc::clone(&self.topic),
        }
    }
}

impl<K, V> EventBus<K, V> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Enqueues `value` with the key computed by `key_selector`.
    pub fn publish<F>(&self, value: V, key_selector: F)
    where
        F: FnOnce(&V) -> K,
    {
        let key = key_selector(&value);
        self.publish_with_key(key, value);
    }

    pub fn publish_with_key(&self, key: K, value: V) {
        if self.tx.send(QueuedMessage { key, value }).is_err() {
            warn!(topic = %self.topic, "Event bus is stopped, message dropped");
        }
    }
}

/// The drain loop owning the queue receiver and the producer.
pub struct EventBusService<K, V> {
    producer: Arc<ProducerCore<K, V>>,
    rx: mpsc::UnboundedReceiver<QueuedMessage<K, V>>,
    drain_interval: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct DrainStats {
    sent: usize,
    failed: usize,
}

impl<K, V> EventBusService<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Panics if `drain_interval` is zero; [`crate::Config::validate`]
    /// rejects such configurations.
    pub fn new(producer: ProducerCore<K, V>, drain_interval: Duration) -> (EventBus<K, V>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = EventBus {
            tx,
            topic: Arc::from(producer.topic()),
        };
        let service = Self {
            producer: Arc::new(producer),
            rx,
            drain_interval,
        };
        (bus, service)
    }

    /// Drains the queue every `drain_interval` until `stopping` is cancelled,
    /// then flushes the producer until every message is delivered or
    /// `flush_cancel` is cancelled. The producer is released on return.
    #[instrument(skip_all, fields(topic = %self.producer.topic()))]
    pub async fn run(self, stopping: CancellationToken, flush_cancel: CancellationToken) -> Result<()> {
        let EventBusService {
            producer,
            mut rx,
            drain_interval,
        } = self;

        info!(interval_ms = drain_interval.as_millis() as u64, "Event bus drain loop started");

        let mut ticker = tokio::time::interval(drain_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stopping.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if rx.is_empty() {
                continue;
            }

            let pass_producer = Arc::clone(&producer);
            let pass_token = stopping.clone();
            let (returned_rx, stats) = tokio::task::spawn_blocking(move || {
                let stats = drain_pass(&pass_producer, &mut rx, &pass_token);
                (rx, stats)
            })
            .await
            .map_err(Error::Join)?;
            rx = returned_rx;

            debug!(sent = stats.sent, failed = stats.failed, "Drain pass finished");
        }

        rx.close();
        let dropped = rx.len();
        if dropped > 0 {
            warn!(dropped, "Event bus stopped with undrained messages");
        }

        info!("Event bus stopping, flushing producer");
        let remaining = tokio::task::spawn_blocking(move || producer.flush_exact(&flush_cancel))
            .await
            .map_err(Error::Join)?;
        info!(remaining, "Event bus stopped");

        Ok(())
    }
}

/// Sends the entries queued when the pass starts, in FIFO order.
///
/// A send that panics (for example in a user `Serialize` impl) counts as a
/// failed entry; the rest of the queue is still sent.
fn drain_pass<K, V>(
    producer: &ProducerCore<K, V>,
    rx: &mut mpsc::UnboundedReceiver<QueuedMessage<K, V>>,
    stopping: &CancellationToken,
) -> DrainStats {
    let mut stats = DrainStats::default();
    let pending = rx.len();

    for _ in 0..pending {
        if stopping.is_cancelled() {
            break;
        }
        let Ok(message) = rx.try_recv() else {
            break;
        };
        let sent = panic::catch_unwind(AssertUnwindSafe(|| {
            producer.send(message.key, message.value, None)
        }));
        match sent {
            Ok(Ok(())) => stats.sent += 1,
            Ok(Err(e)) => {
                error!(error = %e, "Error while sending event message");
                stats.failed += 1;
            }
            Err(_) => {
                error!("Panic while sending event message");
                stats.failed += 1;
            }
        }
    }

    stats
}
