use tracing::error;

/// Receives produce failures reported by the broker client.
///
/// Called from the client's delivery thread, concurrently with `send`.
/// Implementations must not block and must not panic.
pub trait DeliveryErrorHandler<K, V>: Send + Sync {
    fn handle_error(&self, reason: &str, key: &K, value: &V);
}

/// Logs every delivery failure at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorHandler;

impl<K, V> DeliveryErrorHandler<K, V> for LoggingErrorHandler {
    fn handle_error(&self, reason: &str, _key: &K, _value: &V) {
        error!(reason = %reason, "Unable to get ack");
    }
}

impl<K, V, F> DeliveryErrorHandler<K, V> for F
where
    F: Fn(&str, &K, &V) + Send + Sync,
{
    fn handle_error(&self, reason: &str, key: &K, value: &V) {
        self(reason, key, value)
    }
}
