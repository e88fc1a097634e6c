//! Error types and result handling for kafka-event-bus.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use kafka_event_bus::{Error, Result};
//!
//! fn resolve_topic() -> Result<String> {
//!     Err(Error::MissingMessageName {
//!         type_name: "OrderPlaced".to_string(),
//!     })
//! }
//!
//! match resolve_topic() {
//!     Ok(topic) => println!("Publishing to {}", topic),
//!     Err(Error::MissingMessageName { type_name }) => {
//!         eprintln!("{} was never registered", type_name)
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for event bus operations.
///
/// Delivery failures reported by the broker are deliberately absent: they
/// are routed to a [`DeliveryErrorHandler`](crate::delivery::DeliveryErrorHandler)
/// instead of being returned to the caller of `send`.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration values.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file or environment could not be read or parsed.
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// Kafka client, producer or consumer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON serialization error when encoding or decoding messages.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record arrived without bytes for a type that cannot represent null.
    #[error("Null payload received on topic '{topic}' for a non-nullable type")]
    NullPayload {
        /// Topic the record was read from
        topic: String,
    },

    /// A message type was used before a logical name was registered for it.
    #[error("{type_name} has no registered message name, register every message type before building producers or consumers")]
    MissingMessageName {
        /// Rust type name of the unregistered message
        type_name: String,
    },

    /// The application message handler failed while processing a batch.
    #[error("Message handler failed: {0}")]
    Handler(#[from] anyhow::Error),

    /// A blocking broker call panicked or was cancelled by the runtime.
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A convenient Result type alias for event bus operations.
///
/// This is equivalent to `std::result::Result<T, kafka_event_bus::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
