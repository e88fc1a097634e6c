//! Batched consumer bound to a single topic.
//!
//! [`ConsumerCore::read_batch`] polls until either no record arrives within
//! the pull timeout or a record lands on an offset that is a multiple of the
//! batch size. The second condition keeps a single cycle from draining a
//! whole partition backlog.
//!
//! [`ConsumerService::run`] drives the core: busy partitions are read back
//! to back, idle ones are polled once per `poll_interval`. Offsets are
//! committed once, after the loop has stopped.

use crate::broker::{ConsumerClient, InboundRecord};
use crate::config::ConsumerConfig;
use crate::converter::{ConverterFactory, MessageComponent, MessageConverter, SerializationContext};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Application logic for consumed batches.
///
/// An error is fatal for the consumer that produced the batch: the poll loop
/// stops and returns it. Retrying is up to the handler.
#[async_trait]
pub trait MessageHandler<K, V>: Send + Sync {
    async fn handle(&self, messages: Vec<(K, V)>, token: &CancellationToken) -> anyhow::Result<()>;
}

pub struct ConsumerCore<K, V> {
    client: Box<dyn ConsumerClient>,
    key_converter: Arc<dyn MessageConverter<K>>,
    value_converter: Arc<dyn MessageConverter<V>>,
    topic: String,
    key_ctx: SerializationContext,
    value_ctx: SerializationContext,
    pull_timeout: Duration,
    batch_size: i64,
}

impl<K, V> ConsumerCore<K, V>
where
    K: Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new<C, F>(settings: &ConsumerConfig, topic: impl Into<String>, client: C, converters: &F) -> Self
    where
        C: ConsumerClient + 'static,
        F: ConverterFactory,
    {
        let topic = topic.into();
        Self {
            client: Box::new(client),
            key_converter: converters.converter::<K>(),
            value_converter: converters.converter::<V>(),
            key_ctx: SerializationContext::new(topic.clone(), MessageComponent::Key),
            value_ctx: SerializationContext::new(topic.clone(), MessageComponent::Value),
            topic,
            pull_timeout: settings.pull_timeout(),
            batch_size: i64::from(settings.batch_size.get()),
        }
    }
}

impl<K, V> ConsumerCore<K, V> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subscribe(&self) -> Result<()> {
        info!(topic = %self.topic, "Subscribing");
        self.client.subscribe(&self.topic)
    }

    /// Reads the next batch. Blocks for at most `pull_timeout` per poll.
    ///
    /// The batch ends on an empty poll, on cancellation, or right after a
    /// record whose offset is a multiple of the batch size. Each call starts
    /// a fresh batch.
    pub fn read_batch(&self, token: &CancellationToken) -> Result<Vec<(K, V)>> {
        let mut batch = Vec::new();

        while !token.is_cancelled() {
            let Some(record) = self.client.poll(self.pull_timeout)? else {
                break;
            };
            let at_boundary = record.offset % self.batch_size == 0;
            batch.push(self.convert(record)?);
            if at_boundary {
                break;
            }
        }

        Ok(batch)
    }

    pub fn commit(&self) -> Result<()> {
        self.client.commit()?;
        info!(topic = %self.topic, "Offsets committed");
        Ok(())
    }

    fn convert(&self, record: InboundRecord) -> Result<(K, V)> {
        let key = self
            .key_converter
            .deserialize(record.key.as_deref(), &self.key_ctx)?;
        let value = self
            .value_converter
            .deserialize(record.payload.as_deref(), &self.value_ctx)?;
        Ok((key, value))
    }
}

/// Poll loop feeding a [`MessageHandler`].
pub struct ConsumerService<K, V, H> {
    core: ConsumerCore<K, V>,
    handler: H,
    poll_interval: Duration,
}

impl<K, V, H> ConsumerService<K, V, H>
where
    K: Send + 'static,
    V: Send + 'static,
    H: MessageHandler<K, V>,
{
    /// Panics if `poll_interval` is zero; [`crate::Config::validate`]
    /// rejects such configurations.
    pub fn new(core: ConsumerCore<K, V>, handler: H, poll_interval: Duration) -> Self {
        Self {
            core,
            handler,
            poll_interval,
        }
    }

    /// Subscribes, then reads and handles batches until `stopping` is
    /// cancelled. Offsets are committed exactly once after a cancelled loop
    /// exits. A consume or handler failure stops the loop and is returned
    /// without committing, so the failed batch is redelivered on restart.
    #[instrument(skip_all, fields(topic = %self.core.topic()))]
    pub async fn run(self, stopping: CancellationToken) -> Result<()> {
        let ConsumerService {
            mut core,
            handler,
            poll_interval,
        } = self;

        core.subscribe()?;
        info!(interval_ms = poll_interval.as_millis() as u64, "Consumer poll loop started");

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();

        let outcome = loop {
            if stopping.is_cancelled() {
                break Ok(());
            }

            let batch_token = stopping.clone();
            let (returned, batch) = tokio::task::spawn_blocking(move || {
                let batch = core.read_batch(&batch_token);
                (core, batch)
            })
            .await
            .map_err(Error::Join)?;
            core = returned;

            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "Error consuming messages");
                    break Err(e);
                }
            };

            if batch.is_empty() {
                tokio::select! {
                    biased;
                    _ = stopping.cancelled() => break Ok(()),
                    _ = ticker.tick() => continue,
                }
            }

            debug!(count = batch.len(), "Handling batch");
            if let Err(e) = handler.handle(batch, &stopping).await {
                error!(error = %e, "Error handling messages");
                break Err(Error::Handler(e));
            }
        };

        if let Err(e) = outcome {
            warn!("Consumer stopped after a failure, offsets not committed");
            return Err(e);
        }

        tokio::task::spawn_blocking(move || core.commit())
            .await
            .map_err(Error::Join)??;
        info!("Consumer stopped");
        Ok(())
    }
}
