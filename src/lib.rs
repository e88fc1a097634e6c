pub mod broker;
pub mod builder;
pub mod config;
pub mod consumer;
pub mod converter;
pub mod delivery;
pub mod error;
pub mod event_bus;
pub mod kafka;
pub mod message;
pub mod producer;
pub mod time;
pub mod topic;

pub use builder::{ConsumerBuilder, EventBusBuilder};
pub use config::Config;
pub use consumer::{ConsumerCore, ConsumerService, MessageHandler};
pub use error::{Error, Result};
pub use event_bus::{EventBus, EventBusService};
pub use message::{Headers, MessageEnvelope};
pub use producer::ProducerCore;
