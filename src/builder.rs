//! Wiring of producers and consumers from configuration.
//!
//! Every collaborator a producer or consumer needs is a constructor argument,
//! so a half-configured bus cannot be built. Topic names are resolved while
//! building, which makes an unregistered message type fail at startup.
//!
//! # Example
//!
//! ```rust,no_run
//! use kafka_event_bus::builder::EventBusBuilder;
//! use kafka_event_bus::converter::JsonConverter;
//! use kafka_event_bus::delivery::LoggingErrorHandler;
//! use kafka_event_bus::time::SystemTimeProvider;
//! use kafka_event_bus::topic::MessageRegistry;
//! use kafka_event_bus::Config;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Serialize, Deserialize)]
//! struct OrderPlaced {
//!     id: u64,
//! }
//!
//! # async fn example() -> kafka_event_bus::Result<()> {
//! let config = Config::from_file("event-bus.toml")?;
//! let registry = MessageRegistry::new().register::<OrderPlaced>("order-placed");
//!
//! let builder = EventBusBuilder::new(
//!     config,
//!     registry,
//!     JsonConverter,
//!     Arc::new(SystemTimeProvider),
//!     LoggingErrorHandler,
//! )?;
//! let (bus, service) = builder.for_message::<String, OrderPlaced>()?;
//!
//! let stopping = CancellationToken::new();
//! let worker = tokio::spawn(service.run(stopping.clone(), CancellationToken::new()));
//!
//! bus.publish(OrderPlaced { id: 7 }, |order| order.id.to_string());
//!
//! stopping.cancel();
//! worker.await??;
//! # Ok(())
//! # }
//! ```

use crate::broker::{ConsumerClient, ProducerClient};
use crate::consumer::{ConsumerCore, ConsumerService, MessageHandler};
use crate::converter::ConverterFactory;
use crate::delivery::DeliveryErrorHandler;
use crate::event_bus::{EventBus, EventBusService};
use crate::kafka::{KafkaConsumerClient, KafkaProducerClient};
use crate::producer::ProducerCore;
use crate::time::TimeProvider;
use crate::topic::MessageRegistry;
use crate::{Config, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub struct EventBusBuilder<F, E> {
    config: Config,
    registry: MessageRegistry,
    converters: F,
    time: Arc<dyn TimeProvider>,
    errors: Arc<E>,
}

impl<F, E> EventBusBuilder<F, E>
where
    F: ConverterFactory,
    E: 'static,
{
    pub fn new(
        config: Config,
        registry: MessageRegistry,
        converters: F,
        time: Arc<dyn TimeProvider>,
        errors: E,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            converters,
            time,
            errors: Arc::new(errors),
        })
    }

    /// Kafka-backed publish handle and drain service for messages of type `V`.
    pub fn for_message<K, V>(&self) -> Result<(EventBus<K, V>, EventBusService<K, V>)>
    where
        K: Serialize + DeserializeOwned + Send + Sync + 'static,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        E: DeliveryErrorHandler<K, V>,
    {
        let topic = self.registry.topic_name::<V>(&self.config.topics)?;
        let handler: Arc<dyn DeliveryErrorHandler<K, V>> = self.errors.clone();
        let client = KafkaProducerClient::new(&self.config, handler)?;
        Ok(self.build(topic, client))
    }

    /// Same as [`for_message`](Self::for_message) over a caller-supplied
    /// client. The client is responsible for reporting delivery failures.
    pub fn for_message_with_client<K, V, C>(&self, client: C) -> Result<(EventBus<K, V>, EventBusService<K, V>)>
    where
        K: Serialize + DeserializeOwned + Send + Sync + 'static,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        C: ProducerClient<K, V> + 'static,
    {
        let topic = self.registry.topic_name::<V>(&self.config.topics)?;
        Ok(self.build(topic, client))
    }

    /// The configured delivery error handler, for custom clients.
    pub fn error_handler(&self) -> Arc<E> {
        Arc::clone(&self.errors)
    }

    fn build<K, V, C>(&self, topic: String, client: C) -> (EventBus<K, V>, EventBusService<K, V>)
    where
        K: Serialize + DeserializeOwned + Send + Sync + 'static,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        C: ProducerClient<K, V> + 'static,
    {
        info!(
            topic = %topic,
            buffer_length = self.config.producer.buffer_length.get(),
            "Building event bus"
        );
        let producer = ProducerCore::new(
            &self.config.producer,
            topic,
            client,
            &self.converters,
            Arc::clone(&self.time),
        );
        EventBusService::new(producer, self.config.producer.drain_interval())
    }
}

pub struct ConsumerBuilder<F> {
    config: Config,
    registry: MessageRegistry,
    converters: F,
}

impl<F: ConverterFactory> ConsumerBuilder<F> {
    pub fn new(config: Config, registry: MessageRegistry, converters: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            converters,
        })
    }

    /// Kafka-backed consumer for messages of type `V`, feeding `handler`.
    pub fn consumer<K, V, H>(&self, handler: H) -> Result<ConsumerService<K, V, H>>
    where
        K: Serialize + DeserializeOwned + Send + Sync + 'static,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        H: MessageHandler<K, V>,
    {
        let client = KafkaConsumerClient::new(&self.config)?;
        self.consumer_with_client(client, handler)
    }

    pub fn consumer_with_client<K, V, H, C>(&self, client: C, handler: H) -> Result<ConsumerService<K, V, H>>
    where
        K: Serialize + DeserializeOwned + Send + Sync + 'static,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        H: MessageHandler<K, V>,
        C: ConsumerClient + 'static,
    {
        let topic = self.registry.topic_name::<V>(&self.config.topics)?;
        info!(
            topic = %topic,
            group_id = %self.config.consumer.group_id,
            batch_size = self.config.consumer.batch_size.get(),
            "Building consumer"
        );
        let core = ConsumerCore::new(&self.config.consumer, topic, client, &self.converters);
        Ok(ConsumerService::new(core, handler, self.config.consumer.poll_interval()))
    }
}
