//! Message conversion between typed keys/values and broker bytes.
//!
//! A [`ConverterFactory`] is asked once per key and value type when a
//! producer or consumer is built. The resulting [`MessageConverter`]s are
//! then used for every record on that topic.
//!
//! # Example
//!
//! ```rust
//! use kafka_event_bus::converter::{
//!     ConverterFactory, JsonConverter, MessageComponent, SerializationContext,
//! };
//!
//! let converter = JsonConverter.converter::<Option<u32>>();
//! let ctx = SerializationContext::new("numbers", MessageComponent::Value);
//!
//! let bytes = converter.serialize(&Some(7), &ctx).unwrap();
//! assert_eq!(converter.deserialize(Some(&bytes), &ctx).unwrap(), Some(7));
//! assert_eq!(converter.deserialize(None, &ctx).unwrap(), None);
//! ```

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Which half of a record is being converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageComponent {
    Key,
    Value,
}

impl fmt::Display for MessageComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageComponent::Key => write!(f, "key"),
            MessageComponent::Value => write!(f, "value"),
        }
    }
}

/// Where a conversion happens: the topic and the record component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationContext {
    pub topic: String,
    pub component: MessageComponent,
}

impl SerializationContext {
    pub fn new(topic: impl Into<String>, component: MessageComponent) -> Self {
        Self {
            topic: topic.into(),
            component,
        }
    }
}

/// Serializer/deserializer pair for a single type.
pub trait MessageConverter<T>: Send + Sync {
    fn serialize(&self, data: &T, ctx: &SerializationContext) -> Result<Vec<u8>>;

    /// `data` is `None` when the record carried no bytes for this component.
    ///
    /// Types that can represent null (for example `Option<_>`) yield their
    /// null value; all other types fail with [`Error::NullPayload`].
    fn deserialize(&self, data: Option<&[u8]>, ctx: &SerializationContext) -> Result<T>;
}

/// Produces converters for the key and value types of a topic.
pub trait ConverterFactory: Send + Sync {
    fn converter<T>(&self) -> Arc<dyn MessageConverter<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// JSON converters backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl ConverterFactory for JsonConverter {
    fn converter<T>(&self) -> Arc<dyn MessageConverter<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        Arc::new(JsonMessageConverter::<T>::default())
    }
}

struct JsonMessageConverter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for JsonMessageConverter<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> MessageConverter<T> for JsonMessageConverter<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn serialize(&self, data: &T, _ctx: &SerializationContext) -> Result<Vec<u8>> {
        serde_json::to_vec(data).map_err(Into::into)
    }

    fn deserialize(&self, data: Option<&[u8]>, ctx: &SerializationContext) -> Result<T> {
        match data {
            Some(bytes) => serde_json::from_slice(bytes).map_err(Into::into),
            // A missing payload is JSON null: accepted only by nullable targets.
            None => serde_json::from_slice(b"null").map_err(|_| Error::NullPayload {
                topic: ctx.topic.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderPlaced {
        id: u64,
        customer: String,
        lines: Vec<String>,
    }

    fn ctx() -> SerializationContext {
        SerializationContext::new("orders", MessageComponent::Value)
    }

    #[test]
    fn test_struct_round_trip() {
        let converter = JsonConverter.converter::<OrderPlaced>();
        let order = OrderPlaced {
            id: 42,
            customer: "acme".to_string(),
            lines: vec!["widget".to_string(), "gadget".to_string()],
        };

        let bytes = converter.serialize(&order, &ctx()).unwrap();
        let decoded = converter.deserialize(Some(&bytes), &ctx()).unwrap();

        assert_eq!(decoded, order);
    }

    #[test]
    fn test_null_payload_for_nullable_type_yields_default() {
        let converter = JsonConverter.converter::<Option<OrderPlaced>>();
        assert_eq!(converter.deserialize(None, &ctx()).unwrap(), None);

        let unit = JsonConverter.converter::<()>();
        unit.deserialize(None, &ctx()).unwrap();
    }

    #[test]
    fn test_null_payload_for_non_nullable_type_fails() {
        let converter = JsonConverter.converter::<OrderPlaced>();

        match converter.deserialize(None, &ctx()) {
            Err(Error::NullPayload { topic }) => assert_eq!(topic, "orders"),
            other => panic!("expected null payload error, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_json_null_for_non_nullable_type_is_a_serialization_error() {
        let converter = JsonConverter.converter::<u64>();
        let result = converter.deserialize(Some(b"null"), &ctx());
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_malformed_payload() {
        let converter = JsonConverter.converter::<OrderPlaced>();
        let result = converter.deserialize(Some(b"{\"id\":"), &ctx());
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_component_display() {
        assert_eq!(MessageComponent::Key.to_string(), "key");
        assert_eq!(MessageComponent::Value.to_string(), "value");
    }
}
