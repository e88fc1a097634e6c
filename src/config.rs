use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_BUFFER_LENGTH: NonZeroUsize = NonZeroUsize::MIN.saturating_add(99);
const DEFAULT_BATCH_SIZE: NonZeroU32 = NonZeroU32::MIN.saturating_add(99);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub kafka: KafkaConfig,
    /// Topic overrides keyed by logical message name.
    #[serde(default)]
    pub topics: HashMap<String, String>,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Extra librdkafka properties applied to both producer and consumer.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProducerConfig {
    #[serde(default = "default_buffer_length")]
    pub buffer_length: NonZeroUsize,
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_pull_timeout_ms")]
    pub pull_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroU32,
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,
    #[serde(default)]
    pub enable_partition_eof: bool,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("EVENT_BUS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.kafka.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::Config("kafka.brokers must list at least one broker".to_string()));
        }
        if self.producer.drain_interval_ms == 0 {
            return Err(Error::Config("producer.drain_interval_ms must be greater than zero".to_string()));
        }
        if self.consumer.poll_interval_ms == 0 {
            return Err(Error::Config("consumer.poll_interval_ms must be greater than zero".to_string()));
        }
        if self.consumer.group_id.trim().is_empty() {
            return Err(Error::Config("consumer.group_id must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn bootstrap_servers(&self) -> String {
        self.kafka.brokers.join(",")
    }
}

impl ProducerConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            buffer_length: default_buffer_length(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            drain_interval_ms: default_drain_interval_ms(),
            acks: default_acks(),
            compression: default_compression(),
            linger_ms: default_linger_ms(),
        }
    }
}

impl ConsumerConfig {
    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group_id: default_group_id(),
            pull_timeout_ms: default_pull_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            auto_offset_reset: default_auto_offset_reset(),
            enable_partition_eof: false,
        }
    }
}

fn default_client_id() -> String {
    "kafka-event-bus".to_string()
}

fn default_buffer_length() -> NonZeroUsize {
    DEFAULT_BUFFER_LENGTH
}

fn default_delivery_timeout_ms() -> u64 {
    5_000
}

fn default_drain_interval_ms() -> u64 {
    100
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_linger_ms() -> u32 {
    5
}

fn default_group_id() -> String {
    "kafka-event-bus".to_string()
}

fn default_pull_timeout_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_batch_size() -> NonZeroU32 {
    DEFAULT_BATCH_SIZE
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}
