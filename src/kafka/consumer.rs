use super::context::ConsumerLogContext;
use crate::broker::{ConsumerClient, InboundRecord};
use crate::{Config, Error, Result};
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{ClientConfig, Message};
use std::time::Duration;
use tracing::debug;

/// rdkafka-backed consumer client. Polls are synchronous and bounded by the
/// timeout passed to [`ConsumerClient::poll`].
pub struct KafkaConsumerClient {
    consumer: BaseConsumer<ConsumerLogContext>,
}

impl KafkaConsumerClient {
    pub fn new(config: &Config) -> Result<Self> {
        let consumer: BaseConsumer<_> = consumer_client_config(config)
            .create_with_context(ConsumerLogContext)
            .map_err(Error::Kafka)?;

        Ok(Self { consumer })
    }
}

impl ConsumerClient for KafkaConsumerClient {
    fn subscribe(&self, topic: &str) -> Result<()> {
        self.consumer.subscribe(&[topic]).map_err(Error::Kafka)
    }

    fn poll(&self, timeout: Duration) -> Result<Option<InboundRecord>> {
        match self.consumer.poll(timeout) {
            None => Ok(None),
            Some(Err(KafkaError::PartitionEOF(partition))) => {
                debug!(partition, "Reached end of partition");
                Ok(None)
            }
            Some(Err(e)) => Err(Error::Kafka(e)),
            Some(Ok(message)) => Ok(Some(InboundRecord {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(<[u8]>::to_vec),
                payload: message.payload().map(<[u8]>::to_vec),
            })),
        }
    }

    fn commit(&self) -> Result<()> {
        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => Ok(()),
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                debug!("No new offsets to commit");
                Ok(())
            }
            Err(e) => Err(Error::Kafka(e)),
        }
    }
}

pub(crate) fn consumer_client_config(config: &Config) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", config.bootstrap_servers())
        .set("client.id", &config.kafka.client_id)
        .set("group.id", &config.consumer.group_id)
        .set("auto.offset.reset", &config.consumer.auto_offset_reset)
        // Offsets are committed by ConsumerService once its loop has stopped.
        .set("enable.auto.commit", "false")
        .set(
            "enable.partition.eof",
            config.consumer.enable_partition_eof.to_string(),
        );

    for (key, value) in &config.kafka.properties {
        client.set(key, value);
    }

    client
}
