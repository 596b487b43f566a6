//! Minimal embedding example for subwatch-core
//!
//! This example demonstrates using subwatch-core as a library in a custom
//! application: in-process Fetcher and Broadcaster implementations, a memory
//! state store, and one toggle source driven through a full live/offline
//! transition. The engine lifecycle is fully managed by the application.

use chrono::Utc;
use subwatch_core::config::{
    BroadcasterConfig, ComparisonPolicy, EngineConfig, FetcherConfig, SourceConfig,
    StateStoreConfig, WatchConfig,
};
use subwatch_core::traits::{Broadcaster, FetchResult, Fetcher, Item};
use subwatch_core::{MemoryStateStore, Result, WatchEngine};

/// Custom fetcher for embedded usage
///
/// Serves whatever items the application put into the shared slot, so the
/// demo can flip a "live room" on and off while the engine runs.
struct EmbeddedFetcher {
    items: std::sync::Arc<std::sync::Mutex<Vec<Item>>>,
}

impl EmbeddedFetcher {
    fn new() -> (Self, std::sync::Arc<std::sync::Mutex<Vec<Item>>>) {
        let items = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        (
            Self {
                items: items.clone(),
            },
            items,
        )
    }
}

#[async_trait::async_trait]
impl Fetcher for EmbeddedFetcher {
    async fn fetch(&self, key: &str) -> Result<FetchResult> {
        Ok(FetchResult::new(key, self.items.lock().unwrap().clone()))
    }

    fn fetcher_name(&self) -> &'static str {
        "embedded"
    }
}

/// Custom broadcaster for embedded usage
struct EmbeddedBroadcaster;

#[async_trait::async_trait]
impl Broadcaster for EmbeddedBroadcaster {
    async fn send(&self, message: &str) -> Result<()> {
        println!("[Broadcast] {}", message);
        Ok(())
    }

    fn broadcaster_name(&self) -> &'static str {
        "embedded"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded subwatch-core Example ===\n");

    // Create custom components
    let (fetcher, items) = EmbeddedFetcher::new();
    let broadcaster = Box::new(EmbeddedBroadcaster);
    let state_store = Box::new(MemoryStateStore::new());

    // Create configuration: one live room checked every second
    let config = WatchConfig {
        fetcher: FetcherConfig::Custom {
            factory: "embedded".to_string(),
            config: serde_json::json!({}),
        },
        broadcaster: BroadcasterConfig::Custom {
            factory: "embedded".to_string(),
            config: serde_json::json!({}),
        },
        state_store: StateStoreConfig::Memory,
        sources: vec![
            SourceConfig::new("demo-room", "/live/room/1", 1, ComparisonPolicy::Toggle)
                .with_label("Demo room"),
        ],
        engine: EngineConfig::default(),
    };

    // Create engine
    println!("1. Creating engine...");
    let (engine, mut event_rx) =
        WatchEngine::new(Box::new(fetcher), broadcaster, state_store, config)?;

    // Spawn event listener (optional)
    let event_listener = tokio::spawn(async move {
        println!("2. Event listener started");
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
        println!("Event listener stopped");
    });

    // Run engine in background with a controlled shutdown
    println!("3. Starting engine in background...");
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle = tokio::spawn(async move {
        engine.run_with_shutdown(Some(shutdown_rx)).await
    });

    // The room starts offline; put it on air and watch the notification
    tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
    println!("\n4. Going live...");
    items.lock().unwrap().push(Item {
        title: "demo stream".to_string(),
        author: "demo".to_string(),
        description: "now streaming".to_string(),
        published_at: Utc::now(),
        link: "https://example.com/demo-room".to_string(),
    });

    tokio::time::sleep(tokio::time::Duration::from_millis(1_500)).await;

    println!("\n5. Going offline...");
    items.lock().unwrap().clear();

    tokio::time::sleep(tokio::time::Duration::from_millis(1_500)).await;

    // Stop engine through the shutdown channel
    println!("\n6. Stopping engine...");
    let _ = shutdown_tx.send(());
    engine_handle.await.expect("engine task joins")?;

    // The engine is gone, so the event stream terminates
    let _ = tokio::time::timeout(tokio::time::Duration::from_millis(100), event_listener).await;

    println!("\n=== Embedding Successful ===");
    Ok(())
}
