use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Message headers. Keys are unique; values are raw bytes.
pub type Headers = BTreeMap<String, Bytes>;

/// The unit exchanged with the broker.
///
/// An envelope is immutable once built. It is owned by whichever component
/// is transporting it: the producer client while a delivery is in flight,
/// then handed back to the delivery callback.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope<K, V> {
    key: K,
    value: V,
    timestamp: DateTime<Utc>,
    headers: Headers,
}

impl<K, V> MessageEnvelope<K, V> {
    pub fn new(key: K, value: V, timestamp: DateTime<Utc>, headers: Headers) -> Self {
        Self {
            key,
            value,
            timestamp,
            headers,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}
