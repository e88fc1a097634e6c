//! Topic resolution for message types.
//!
//! Every message type is registered up front with a logical name. The topic
//! a type is bound to is the `[topics]` override for that logical name, or
//! the lower-cased Rust type name when no override exists.
//!
//! # Example
//!
//! ```rust
//! use kafka_event_bus::topic::MessageRegistry;
//! use std::collections::HashMap;
//!
//! struct OrderPlaced;
//! struct OrderShipped;
//!
//! let registry = MessageRegistry::new()
//!     .register::<OrderPlaced>("order-placed")
//!     .register::<OrderShipped>("order-shipped");
//!
//! let overrides = HashMap::from([("order-placed".to_string(), "orders.v1".to_string())]);
//!
//! assert_eq!(registry.topic_name::<OrderPlaced>(&overrides).unwrap(), "orders.v1");
//! assert_eq!(registry.topic_name::<OrderShipped>(&overrides).unwrap(), "ordershipped");
//! ```

use crate::{Error, Result};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    names: HashMap<TypeId, String>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the logical name of `T`. Registering a type twice keeps the
    /// last name.
    pub fn register<T: 'static>(mut self, name: impl Into<String>) -> Self {
        self.names.insert(TypeId::of::<T>(), name.into());
        self
    }

    pub fn message_name<T: 'static>(&self) -> Result<&str> {
        self.names
            .get(&TypeId::of::<T>())
            .map(String::as_str)
            .ok_or_else(|| Error::MissingMessageName {
                type_name: type_name::<T>().to_string(),
            })
    }

    /// Startup completeness check for a type that will be produced or consumed.
    pub fn ensure_registered<T: 'static>(&self) -> Result<()> {
        self.message_name::<T>().map(|_| ())
    }

    pub fn topic_name<T: 'static>(&self, overrides: &HashMap<String, String>) -> Result<String> {
        let message_name = self.message_name::<T>()?;
        let topic = match overrides.get(message_name) {
            Some(topic) => topic.clone(),
            None => short_type_name::<T>().to_lowercase(),
        };
        debug!(message = %message_name, topic = %topic, "Resolved topic");
        Ok(topic)
    }
}

/// `my_app::events::OrderPlaced<u32>` -> `OrderPlaced`
fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
