// # Webhook Broadcaster
//
// This crate provides a webhook fan-out Broadcaster for the subwatch engine.
//
// ## Behavior
//
// Every notification is POSTed as `{"text": "..."}` to each configured URL.
// Delivery counts as confirmed only when every endpoint accepts the message;
// otherwise the send reports a broadcast error and the engine drops the
// notification (it never retries, the baseline is already committed).
//
// ## Architectural Constraints
//
// - ✅ One POST per endpoint per notification
// - ✅ HTTP timeout configured
// - ❌ NO retry logic (at-most-once is the engine's policy)
// - ❌ NO state access (owned by the engine and StateStore)
// - ❌ NO background tasks (violates shutdown determinism)

use subwatch_core::ComponentRegistry;
use subwatch_core::config::BroadcasterConfig;
use subwatch_core::traits::{Broadcaster, BroadcasterFactory};
use subwatch_core::{Error, Result};

use std::time::Duration;

/// HTTP request timeout for webhook delivery
const DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Webhook fan-out broadcaster
pub struct WebhookBroadcaster {
    /// Endpoints to deliver to
    urls: Vec<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl WebhookBroadcaster {
    /// Create a new webhook broadcaster
    ///
    /// # Parameters
    ///
    /// - `urls`: Webhook endpoints; every notification goes to all of them
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Deliver one message to one endpoint
    async fn deliver(&self, url: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await
            .map_err(|e| Error::broadcast(format!("POST {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::broadcast(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Broadcaster for WebhookBroadcaster {
    async fn send(&self, message: &str) -> Result<()> {
        let mut failures = Vec::new();

        for url in &self.urls {
            match self.deliver(url, message).await {
                Ok(()) => {
                    tracing::debug!("delivered to {}", url);
                }
                Err(e) => {
                    tracing::warn!("webhook delivery failed: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::broadcast(format!(
                "{}/{} endpoint(s) failed: {}",
                failures.len(),
                self.urls.len(),
                failures.join("; ")
            )))
        }
    }

    fn broadcaster_name(&self) -> &'static str {
        "webhook"
    }
}

/// Factory for creating webhook broadcasters
pub struct WebhookFactory;

impl BroadcasterFactory for WebhookFactory {
    fn create(&self, config: &BroadcasterConfig) -> Result<Box<dyn Broadcaster>> {
        match config {
            BroadcasterConfig::Webhook { urls } => {
                Ok(Box::new(WebhookBroadcaster::new(urls.clone())))
            }
            _ => Err(Error::config("invalid config for webhook broadcaster")),
        }
    }
}

/// Register the webhook broadcaster with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_broadcaster("webhook", Box::new(WebhookFactory));
}
