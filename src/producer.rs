//! Buffered, topic-bound producer.
//!
//! [`ProducerCore`] hands every message to the broker client's asynchronous
//! produce path and only waits for acknowledgements in two places: every
//! `buffer_length` sends (a flush bounded by the delivery timeout) and once
//! at shutdown ([`ProducerCore::flush_exact`]).
//!
//! Dropping the producer releases the client handle. Dropping is always safe,
//! including after a cancelled `flush_exact`.

use crate::broker::{ProducerClient, SerializedMessage};
use crate::config::ProducerConfig;
use crate::converter::{ConverterFactory, MessageComponent, MessageConverter, SerializationContext};
use crate::message::{Headers, MessageEnvelope};
use crate::time::TimeProvider;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ProducerCore<K, V> {
    client: Box<dyn ProducerClient<K, V>>,
    key_converter: Arc<dyn MessageConverter<K>>,
    value_converter: Arc<dyn MessageConverter<V>>,
    time: Arc<dyn TimeProvider>,
    topic: String,
    key_ctx: SerializationContext,
    value_ctx: SerializationContext,
    buffer_length: usize,
    delivery_timeout: Duration,
    buffered: AtomicUsize,
}

impl<K, V> ProducerCore<K, V>
where
    K: Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new<C, F>(
        settings: &ProducerConfig,
        topic: impl Into<String>,
        client: C,
        converters: &F,
        time: Arc<dyn TimeProvider>,
    ) -> Self
    where
        C: ProducerClient<K, V> + 'static,
        F: ConverterFactory,
    {
        let topic = topic.into();
        Self {
            client: Box::new(client),
            key_converter: converters.converter::<K>(),
            value_converter: converters.converter::<V>(),
            time,
            key_ctx: SerializationContext::new(topic.clone(), MessageComponent::Key),
            value_ctx: SerializationContext::new(topic.clone(), MessageComponent::Value),
            topic,
            buffer_length: settings.buffer_length.get(),
            delivery_timeout: settings.delivery_timeout(),
            buffered: AtomicUsize::new(0),
        }
    }
}

impl<K, V> ProducerCore<K, V> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Messages sent since the last threshold flush. Advisory only.
    pub fn buffered(&self) -> usize {
        self.buffered.load(Ordering::Acquire)
    }

    /// Stamps, serializes and produces one message.
    ///
    /// Delivery failures never surface here; they reach the delivery error
    /// handler through the client's callback. An `Err` means the message was
    /// not accepted at all (serialization failure or client refusal).
    pub fn send(&self, key: K, value: V, headers: Option<Headers>) -> Result<()> {
        let serialized = SerializedMessage {
            key: self.key_converter.serialize(&key, &self.key_ctx)?,
            value: self.value_converter.serialize(&value, &self.value_ctx)?,
        };
        let envelope = MessageEnvelope::new(key, value, self.time.now(), headers.unwrap_or_default());

        self.client.produce(&self.topic, envelope, serialized)?;

        if self.record_buffered() {
            let remaining = self.client.flush(self.delivery_timeout);
            if remaining > 0 {
                warn!(
                    topic = %self.topic,
                    remaining,
                    "Not all messages were flushed, the queue still contains undelivered messages"
                );
            } else {
                debug!(topic = %self.topic, "Buffer flushed");
            }
        }

        Ok(())
    }

    /// Counts one buffered message. Returns true when the buffer length was
    /// reached, in which case the counter has already been reset to zero.
    fn record_buffered(&self) -> bool {
        let limit = self.buffer_length;
        let previous = self
            .buffered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(if count + 1 >= limit { 0 } else { count + 1 })
            })
            .unwrap_or_else(|count| count);
        previous + 1 >= limit
    }

    /// Flushes until the client reports no undelivered messages.
    ///
    /// Flushes at least once. The only exit besides a fully drained client is
    /// `token` being cancelled, so a token that is never cancelled can block
    /// the caller indefinitely while the broker is unreachable. Returns the
    /// number of messages still undelivered (zero unless cancelled).
    pub fn flush_exact(&self, token: &CancellationToken) -> usize {
        let mut attempts = 0u64;
        loop {
            attempts += 1;
            let remaining = self.client.flush(self.delivery_timeout);
            if remaining == 0 {
                info!(topic = %self.topic, attempts, "All produced messages delivered");
                return 0;
            }
            if token.is_cancelled() {
                warn!(
                    topic = %self.topic,
                    remaining,
                    attempts,
                    "Flush cancelled before all messages were delivered"
                );
                return remaining;
            }
            debug!(topic = %self.topic, remaining, attempts, "Messages still in flight");
        }
    }
}
