//! The seams between the event bus and a concrete broker client.
//!
//! [`crate::kafka`] implements these on top of rdkafka. Everything above
//! this module (producer buffering, drain loop, batched reads) only talks to
//! the traits, so it can run against an in-memory client in tests.

use crate::message::MessageEnvelope;
use crate::Result;
use std::time::Duration;

/// Key and value bytes produced by the converters for one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedMessage {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

pub trait ProducerClient<K, V>: Send + Sync {
    /// Hands a message to the client's asynchronous produce path.
    ///
    /// An `Err` means the client refused the message outright (queue full,
    /// unknown topic, client failure). The delivery outcome of an accepted
    /// message is reported later through the client's delivery callback.
    fn produce(
        &self,
        topic: &str,
        envelope: MessageEnvelope<K, V>,
        serialized: SerializedMessage,
    ) -> Result<()>;

    /// Blocks up to `timeout` waiting for outstanding deliveries and returns
    /// how many are still undelivered.
    fn flush(&self, timeout: Duration) -> usize;
}

/// A raw record as returned by a consumer poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

pub trait ConsumerClient: Send {
    fn subscribe(&self, topic: &str) -> Result<()>;

    /// Waits at most `timeout` for the next record. `Ok(None)` means nothing
    /// arrived in time or the partition end was reached.
    fn poll(&self, timeout: Duration) -> Result<Option<InboundRecord>>;

    /// Synchronously commits the current consumer positions.
    fn commit(&self) -> Result<()>;
}
