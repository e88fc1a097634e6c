use super::context::DeliveryContext;
use crate::broker::{ProducerClient, SerializedMessage};
use crate::delivery::DeliveryErrorHandler;
use crate::message::MessageEnvelope;
use crate::{Config, Error, Result};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{BaseRecord, Producer, ThreadedProducer};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// rdkafka-backed producer client.
///
/// A `ThreadedProducer` polls on its own thread, which is where delivery
/// reports are turned into [`DeliveryErrorHandler`] calls.
pub struct KafkaProducerClient<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    producer: ThreadedProducer<DeliveryContext<K, V>>,
}

impl<K, V> KafkaProducerClient<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(config: &Config, handler: Arc<dyn DeliveryErrorHandler<K, V>>) -> Result<Self> {
        let producer: ThreadedProducer<_> = producer_client_config(config)
            .create_with_context(DeliveryContext::new(handler))
            .map_err(Error::Kafka)?;

        Ok(Self { producer })
    }
}

impl<K, V> ProducerClient<K, V> for KafkaProducerClient<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn produce(
        &self,
        topic: &str,
        envelope: MessageEnvelope<K, V>,
        serialized: SerializedMessage,
    ) -> Result<()> {
        let headers = envelope.headers().iter().fold(
            OwnedHeaders::new_with_capacity(envelope.headers().len()),
            |headers, (key, value)| {
                headers.insert(Header {
                    key: key.as_str(),
                    value: Some(&value[..]),
                })
            },
        );
        let timestamp = envelope.timestamp().timestamp_millis();

        let record = BaseRecord::with_opaque_to(topic, Box::new(envelope))
            .key(&serialized.key[..])
            .payload(&serialized.value[..])
            .timestamp(timestamp)
            .headers(headers);

        self.producer
            .send(record)
            .map_err(|(e, _)| Error::Kafka(e))
    }

    fn flush(&self, timeout: Duration) -> usize {
        if let Err(e) = self.producer.flush(timeout) {
            debug!(error = %e, "Flush returned before all deliveries completed");
        }
        usize::try_from(self.producer.in_flight_count()).unwrap_or(0)
    }
}

pub(crate) fn producer_client_config(config: &Config) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", config.bootstrap_servers())
        .set("client.id", &config.kafka.client_id)
        .set("compression.type", &config.producer.compression)
        .set("acks", &config.producer.acks)
        .set("linger.ms", config.producer.linger_ms.to_string());

    for (key, value) in &config.kafka.properties {
        client.set(key, value);
    }

    client
}
