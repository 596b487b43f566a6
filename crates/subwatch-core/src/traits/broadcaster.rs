// # Broadcaster Trait
//
// Defines the interface for delivering a notification to all interested
// recipients.
//
// ## Implementations
//
// - Webhook fan-out: `subwatch-broadcast-webhook` crate
// - Future: message queues, email

use async_trait::async_trait;

/// Trait for broadcaster implementations
///
/// Delivery is best-effort and **single-shot**: the engine commits the new
/// baseline before calling `send`, and a failed delivery is logged and
/// dropped rather than retried (duplicate alerts are judged worse than an
/// occasional missed one).
///
/// Broadcasters are isolated outbound collaborators:
///
/// - ✅ Perform the delivery call(s) for one message
/// - ❌ Implement retry or backoff (at-most-once is the engine's policy)
/// - ❌ Access the state store or other components
/// - ❌ Spawn background tasks
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Deliver a message to all recipients
    ///
    /// # Parameters
    ///
    /// - `message`: The notification text
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Delivery confirmed
    /// - `Err(Error)`: Delivery could not be confirmed
    async fn send(&self, message: &str) -> Result<(), crate::Error>;

    /// Get the broadcaster name (for logging/debugging)
    fn broadcaster_name(&self) -> &'static str;
}

/// Helper trait for constructing broadcasters from configuration
pub trait BroadcasterFactory: Send + Sync {
    /// Create a Broadcaster instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this broadcaster type
    ///
    /// # Returns
    ///
    /// A boxed Broadcaster trait object
    fn create(
        &self,
        config: &crate::config::BroadcasterConfig,
    ) -> Result<Box<dyn Broadcaster>, crate::Error>;
}
