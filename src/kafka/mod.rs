pub mod consumer;
pub mod context;
pub mod producer;

#[cfg(test)]
mod tests;

pub use consumer::KafkaConsumerClient;
pub use context::{ConsumerLogContext, DeliveryContext};
pub use producer::KafkaProducerClient;
