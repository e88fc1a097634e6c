use crate::delivery::DeliveryErrorHandler;
use crate::message::MessageEnvelope;
use rdkafka::client::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::ConsumerContext;
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::producer::{DeliveryResult, ProducerContext};
use rdkafka::statistics::Statistics;
use rdkafka::TopicPartitionList;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Producer context: routes failed deliveries to the error handler and logs
/// client-level events.
///
/// `delivery` runs on the producer's polling thread.
pub struct DeliveryContext<K, V> {
    handler: Arc<dyn DeliveryErrorHandler<K, V>>,
}

impl<K, V> DeliveryContext<K, V> {
    pub fn new(handler: Arc<dyn DeliveryErrorHandler<K, V>>) -> Self {
        Self { handler }
    }
}

impl<K, V> ClientContext for DeliveryContext<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        log_client_message("producer", level, fac, log_message);
    }

    fn stats(&self, statistics: Statistics) {
        log_statistics("producer", &statistics);
    }

    fn error(&self, error: KafkaError, reason: &str) {
        error!(client = "producer", error = %error, reason = %reason, "Global error in producer");
    }
}

impl<K, V> ProducerContext for DeliveryContext<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type DeliveryOpaque = Box<MessageEnvelope<K, V>>;

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, envelope: Self::DeliveryOpaque) {
        if let Err((error, _)) = delivery_result {
            let (key, value) = envelope.into_parts();
            self.handler.handle_error(&error.to_string(), &key, &value);
        }
    }
}

/// Consumer context: logging only.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsumerLogContext;

impl ClientContext for ConsumerLogContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        log_client_message("consumer", level, fac, log_message);
    }

    fn stats(&self, statistics: Statistics) {
        log_statistics("consumer", &statistics);
    }

    fn error(&self, error: KafkaError, reason: &str) {
        error!(client = "consumer", error = %error, reason = %reason, "Global error in consumer");
    }
}

impl ConsumerContext for ConsumerLogContext {
    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => debug!(partitions = offsets.count(), "Offsets committed by broker"),
            Err(e) => warn!(error = %e, "Offset commit failed"),
        }
    }
}

fn log_client_message(client: &str, level: RDKafkaLogLevel, fac: &str, message: &str) {
    match level {
        RDKafkaLogLevel::Emerg
        | RDKafkaLogLevel::Alert
        | RDKafkaLogLevel::Critical
        | RDKafkaLogLevel::Error => error!(client, facility = fac, "{}", message),
        RDKafkaLogLevel::Warning => warn!(client, facility = fac, "{}", message),
        RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => info!(client, facility = fac, "{}", message),
        RDKafkaLogLevel::Debug => debug!(client, facility = fac, "{}", message),
    }
}

fn log_statistics(client: &str, statistics: &Statistics) {
    debug!(
        client,
        name = %statistics.name,
        queued = statistics.msg_cnt,
        "Client statistics"
    );
}
