// # subwatchd - Subscription Watch Daemon
//
// The subwatchd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime and tracing
// 3. Registering fetchers, broadcasters and state stores
// 4. Starting the watch engine
//
// All change-detection logic lives in subwatch-core; nothing here decides
// what counts as a change or when to notify.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Fetcher
// - `SUBWATCH_FETCHER_TYPE`: Fetcher type (rsshub)
// - `SUBWATCH_FETCHER_BASE_URL`: Endpoint base URL (for rsshub)
//
// ### Broadcaster
// - `SUBWATCH_BROADCASTER_TYPE`: Broadcaster type (webhook)
// - `SUBWATCH_BROADCAST_URLS`: Comma-separated webhook URLs
//
// ### Sources
// - `SUBWATCH_SOURCES`: Comma-separated source entries, each of the form
//   `id:fetch_key:interval_secs:policy` where policy is `toggle` or
//   `monotonic_timestamp`
//
// ### State Store
// - `SUBWATCH_STATE_STORE_TYPE`: Type of state store (memory, file)
// - `SUBWATCH_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Engine
// - `SUBWATCH_FETCH_TIMEOUT_SECS`: Per-fetch timeout
// - `SUBWATCH_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export SUBWATCH_FETCHER_BASE_URL=http://localhost:1200
// export SUBWATCH_BROADCAST_URLS=https://hooks.example.com/T000/B000/XXXX
// export SUBWATCH_SOURCES="bili-live:/bilibili/live/room/2529408:10:toggle,\
// weibo:/weibo/user/1195230310:30:monotonic_timestamp"
// export SUBWATCH_STATE_STORE_TYPE=file
// export SUBWATCH_STATE_STORE_PATH=/var/lib/subwatch/state.json
//
// subwatchd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use subwatch_core::config::{
    BroadcasterConfig, ComparisonPolicy, EngineConfig, FetcherConfig, SourceConfig,
    StateStoreConfig, WatchConfig,
};
use subwatch_core::{ComponentRegistry, WatchEngine};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SubwatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SubwatchExitCode> for ExitCode {
    fn from(code: SubwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    fetcher_type: String,
    fetcher_base_url: Option<String>,
    broadcaster_type: String,
    broadcast_urls: Vec<String>,
    sources: Vec<String>,
    state_store_type: String,
    state_store_path: Option<String>,
    fetch_timeout_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            fetcher_type: env::var("SUBWATCH_FETCHER_TYPE").unwrap_or_else(|_| "rsshub".to_string()),
            fetcher_base_url: env::var("SUBWATCH_FETCHER_BASE_URL").ok(),
            broadcaster_type: env::var("SUBWATCH_BROADCASTER_TYPE")
                .unwrap_or_else(|_| "webhook".to_string()),
            broadcast_urls: env::var("SUBWATCH_BROADCAST_URLS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            sources: env::var("SUBWATCH_SOURCES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            state_store_type: env::var("SUBWATCH_STATE_STORE_TYPE")
                .unwrap_or_else(|_| "memory".to_string()),
            state_store_path: env::var("SUBWATCH_STATE_STORE_PATH").ok(),
            fetch_timeout_secs: env::var("SUBWATCH_FETCH_TIMEOUT_SECS")
                .ok()
                .map(|s| s.parse())
                .transpose()
                .map_err(|e| anyhow::anyhow!("SUBWATCH_FETCH_TIMEOUT_SECS is not a number: {e}"))?,
            log_level: env::var("SUBWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// This performs comprehensive validation including:
    /// - Required field presence
    /// - URL scheme checks
    /// - Source entry format and numeric ranges
    /// - Type enumeration validation
    fn validate(&self) -> Result<()> {
        // Validate fetcher
        match self.fetcher_type.as_str() {
            "rsshub" => {
                let Some(base_url) = self.fetcher_base_url.as_deref() else {
                    anyhow::bail!(
                        "SUBWATCH_FETCHER_BASE_URL is required when SUBWATCH_FETCHER_TYPE=rsshub. \
                        Set it via: export SUBWATCH_FETCHER_BASE_URL=http://localhost:1200"
                    );
                };
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    anyhow::bail!(
                        "SUBWATCH_FETCHER_BASE_URL must use HTTP or HTTPS scheme. Got: {}",
                        base_url
                    );
                }
            }
            _ => anyhow::bail!(
                "SUBWATCH_FETCHER_TYPE '{}' is not supported. Supported fetchers: rsshub",
                self.fetcher_type
            ),
        }

        // Validate broadcaster
        match self.broadcaster_type.as_str() {
            "webhook" => {
                if self.broadcast_urls.is_empty() {
                    anyhow::bail!(
                        "SUBWATCH_BROADCAST_URLS must contain at least one URL. \
                        Set it via: export SUBWATCH_BROADCAST_URLS=https://hooks.example.com/xxx"
                    );
                }
                for url in &self.broadcast_urls {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!(
                            "SUBWATCH_BROADCAST_URLS entries must use HTTP or HTTPS. Got: {}",
                            url
                        );
                    }
                }
            }
            _ => anyhow::bail!(
                "SUBWATCH_BROADCASTER_TYPE '{}' is not supported. Supported broadcasters: webhook",
                self.broadcaster_type
            ),
        }

        // Validate sources
        if self.sources.is_empty() {
            anyhow::bail!(
                "SUBWATCH_SOURCES must contain at least one source. \
                Set it via: export SUBWATCH_SOURCES=\"bili:/bilibili/live/room/2529408:10:toggle\""
            );
        }
        for entry in &self.sources {
            parse_source(entry)?;
        }

        // Validate state store
        match self.state_store_type.as_str() {
            "memory" => {}
            "file" => {
                let Some(path) = self.state_store_path.as_deref() else {
                    anyhow::bail!(
                        "SUBWATCH_STATE_STORE_PATH is required when SUBWATCH_STATE_STORE_TYPE=file. \
                        Set it via: export SUBWATCH_STATE_STORE_PATH=/var/lib/subwatch/state.json"
                    );
                };
                if path.is_empty() {
                    anyhow::bail!(
                        "SUBWATCH_STATE_STORE_PATH cannot be empty when SUBWATCH_STATE_STORE_TYPE=file"
                    );
                }
            }
            _ => anyhow::bail!(
                "SUBWATCH_STATE_STORE_TYPE '{}' is not supported. Supported types: memory, file",
                self.state_store_type
            ),
        }

        // Validate numeric ranges
        if let Some(timeout) = self.fetch_timeout_secs
            && !(1..=300).contains(&timeout)
        {
            anyhow::bail!(
                "SUBWATCH_FETCH_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                timeout
            );
        }

        // Validate log level
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SUBWATCH_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the engine configuration from the validated environment
    fn to_watch_config(&self) -> Result<WatchConfig> {
        let fetcher = FetcherConfig::Rsshub {
            base_url: self
                .fetcher_base_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("SUBWATCH_FETCHER_BASE_URL is required"))?,
        };

        let broadcaster = BroadcasterConfig::Webhook {
            urls: self.broadcast_urls.clone(),
        };

        let state_store = match self.state_store_type.as_str() {
            "file" => StateStoreConfig::File {
                path: self
                    .state_store_path
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("SUBWATCH_STATE_STORE_PATH is required"))?,
            },
            _ => StateStoreConfig::Memory,
        };

        let sources = self
            .sources
            .iter()
            .map(|entry| parse_source(entry))
            .collect::<Result<Vec<_>>>()?;

        let mut engine = EngineConfig::default();
        if let Some(timeout) = self.fetch_timeout_secs {
            engine.fetch_timeout_secs = timeout;
        }

        Ok(WatchConfig {
            fetcher,
            broadcaster,
            state_store,
            sources,
            engine,
        })
    }
}

/// Parse one `id:fetch_key:interval_secs:policy` source entry
///
/// The fetch key may itself contain `/` and query parameters; the id is
/// everything before the first `:` and interval/policy are the last two
/// fields, so the key is free to carry anything in between except `,`.
fn parse_source(entry: &str) -> Result<SourceConfig> {
    let mut tail = entry.rsplitn(3, ':');
    let policy_raw = tail.next().unwrap_or_default();
    let interval_raw = tail.next().unwrap_or_default();
    let head = tail.next().unwrap_or_default();

    let Some((id, fetch_key)) = head.split_once(':') else {
        anyhow::bail!(
            "SUBWATCH_SOURCES entry '{}' is malformed. \
            Expected id:fetch_key:interval_secs:policy",
            entry
        );
    };

    if id.is_empty() || fetch_key.is_empty() {
        anyhow::bail!(
            "SUBWATCH_SOURCES entry '{}' has an empty id or fetch key",
            entry
        );
    }

    let interval_secs: u64 = interval_raw.parse().map_err(|_| {
        anyhow::anyhow!(
            "SUBWATCH_SOURCES entry '{}' has a bad interval '{}'. \
            Expected a number of seconds",
            entry,
            interval_raw
        )
    })?;
    if !(1..=86_400).contains(&interval_secs) {
        anyhow::bail!(
            "SUBWATCH_SOURCES entry '{}' interval must be between 1 and 86400 seconds. Got: {}",
            entry,
            interval_secs
        );
    }

    let policy = match policy_raw {
        "toggle" => ComparisonPolicy::Toggle,
        "monotonic_timestamp" => ComparisonPolicy::MonotonicTimestamp,
        _ => anyhow::bail!(
            "SUBWATCH_SOURCES entry '{}' has unknown policy '{}'. \
            Valid policies: toggle, monotonic_timestamp",
            entry,
            policy_raw
        ),
    };

    Ok(SourceConfig::new(id, fetch_key, interval_secs, policy))
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SubwatchExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SubwatchExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SubwatchExitCode::ConfigError.into();
    }

    info!("starting subwatchd daemon");
    info!("configuration loaded: {} source(s)", config.sources.len());

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {}", e);
            return SubwatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("daemon error: {}", e);
            SubwatchExitCode::RuntimeError
        } else {
            SubwatchExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    // Create the component registry and register built-ins
    let registry = ComponentRegistry::new();
    subwatch_core::state::register(&registry);

    #[cfg(feature = "rsshub")]
    {
        info!("registering RSSHub fetcher");
        subwatch_fetch_rsshub::register(&registry);
    }

    #[cfg(feature = "webhook")]
    {
        info!("registering webhook broadcaster");
        subwatch_broadcast_webhook::register(&registry);
    }

    // Build components from configuration
    let watch_config = config.to_watch_config()?;
    let fetcher = registry.create_fetcher(&watch_config.fetcher)?;
    let broadcaster = registry.create_broadcaster(&watch_config.broadcaster)?;
    let state_store = registry.create_state_store(&watch_config.state_store).await?;

    for source in &watch_config.sources {
        info!(
            "watching {} ({:?} every {}s)",
            source.id, source.policy, source.interval_secs
        );
    }

    let (engine, mut event_rx) = WatchEngine::new(fetcher, broadcaster, state_store, watch_config)?;

    // Drain engine events into logs
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            tracing::debug!(?event, "engine event");
        }
    });

    // Forward OS signals to the engine's controlled shutdown
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(sig) => info!("received shutdown signal: {}", sig),
            Err(e) => error!("shutdown signal error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("starting watch engine");
    engine.run_with_shutdown(Some(shutdown_rx)).await?;

    info!("daemon stopped");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to setup SIGINT handler: {}", e))?;

    let signal_name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    Ok(signal_name)
}

/// Wait for shutdown signals (Ctrl-C only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
