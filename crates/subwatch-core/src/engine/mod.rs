//! Core watch engine
//!
//! The WatchEngine is responsible for:
//! - Scheduling one polling task per source
//! - Fetching the current items via the Fetcher (with a timeout)
//! - Deciding whether anything changed via the change detector
//! - Committing the new baseline and broadcasting the notification
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Scheduler  │─── per-source tick ────┐
//! └─────────────┘                        │
//!                                        ▼
//!                               ┌──────────────┐
//!                               │   Fetcher    │ (external)
//!                               └──────────────┘
//!                                        │
//!                                        ▼
//!                               ┌──────────────┐
//!                               │   Detector   │ (pure)
//!                               └──────────────┘
//!                                        │ Changed
//!         ┌──────────────────────────────┼──────────────────────────┐
//!         │                              │                          │
//!         ▼                              ▼                          ▼
//! ┌─────────────┐              ┌──────────────┐           ┌─────────────┐
//! │ StateStore  │              │ Broadcaster  │           │   Events    │
//! │ (commit)    │   then       │ (send)       │           │  (notify)   │
//! └─────────────┘              └──────────────┘           └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. The source's interval ticks
//! 2. Fetch the current items (timeout-wrapped)
//! 3. Compare against the committed value
//! 4. If changed, commit the new baseline, then broadcast
//! 5. Emit an event for monitoring/logging
//!
//! A fetch or broadcast failure abandons that cycle only; the next tick
//! retries independently and no other source's schedule is affected.

use crate::config::{SourceConfig, WatchConfig};
use crate::detector::{self, Detection};
use crate::error::Result;
use crate::traits::state_store::SourceState;
use crate::traits::{Broadcaster, FetchResult, Fetcher, StateStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Events emitted by the WatchEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A source was seeded from a successful fetch
    SourceInitialized {
        source_id: String,
    },

    /// A source's initial fetch failed; it stays unknown until a poll succeeds
    InitialFetchFailed {
        source_id: String,
        error: String,
    },

    /// A reportable change was detected and committed
    ChangeDetected {
        source_id: String,
        message: String,
    },

    /// The notification for a committed change was delivered
    NotificationSent {
        source_id: String,
    },

    /// The notification could not be delivered (the commit stands)
    BroadcastFailed {
        source_id: String,
        error: String,
    },

    /// A polling fetch failed; the cycle was abandoned
    FetchFailed {
        source_id: String,
        error: String,
    },

    /// Engine started
    Started {
        sources_count: usize,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Core watch engine
///
/// The engine orchestrates the poll → detect → commit → broadcast flow for
/// every configured source. It runs until a shutdown signal is received.
///
/// ## Lifecycle
///
/// 1. Create with [`WatchEngine::new()`]
/// 2. Start with [`WatchEngine::run()`]
/// 3. Engine runs until shutdown signal received
/// 4. Drop to cleanup
///
/// ## Threading
///
/// Each source initializes and polls on its own task, so a slow fetch for one
/// source never delays another. A source is never polled concurrently with
/// itself: its cycle runs inline inside its task and missed ticks are delayed
/// rather than queued. Sources share nothing but the state store, which is
/// keyed per source.
///
/// ## Load Resistance
///
/// - **Bounded event channel**: when full, events are dropped with a warning
/// - **Per-fetch timeout**: a hung Fetcher cannot stall a source forever
pub struct WatchEngine {
    /// Fetcher for retrieving source items
    fetcher: Arc<dyn Fetcher>,

    /// Broadcaster for delivering notifications
    broadcaster: Arc<dyn Broadcaster>,

    /// State store holding the per-source baselines
    state_store: Arc<dyn StateStore>,

    /// Sources to watch
    sources: Vec<SourceConfig>,

    /// Timeout applied to every fetch
    fetch_timeout: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl WatchEngine {
    /// Create a new watch engine
    ///
    /// # Parameters
    ///
    /// - `fetcher`: Fetcher implementation
    /// - `broadcaster`: Broadcaster implementation
    /// - `state_store`: State store implementation
    /// - `config`: Watcher configuration (validated here; configuration
    ///   errors are fatal before any task is spawned)
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        broadcaster: Box<dyn Broadcaster>,
        state_store: Box<dyn StateStore>,
        config: WatchConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            fetcher: Arc::from(fetcher),
            broadcaster: Arc::from(broadcaster),
            state_store: Arc::from(state_store),
            sources: config.sources,
            fetch_timeout: config.engine.fetch_timeout(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine
    ///
    /// Starts one task per enabled source (initial seed fetch, then the
    /// polling loop) and runs until Ctrl-C.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine with a controlled shutdown signal
    ///
    /// For callers that manage their own signals (the daemon, tests). When
    /// the oneshot fires, no new cycle starts; in-flight cycles run to
    /// completion and the state store is flushed before this returns.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let enabled: Vec<SourceConfig> = self
            .sources
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect();

        self.emit_event(EngineEvent::Started {
            sources_count: enabled.len(),
        });
        info!("starting watch engine with {} source(s)", enabled.len());

        // One task per source, all stopped through one watch channel.
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(enabled.len());
        for source in enabled {
            handles.push(self.spawn_source_task(source, stop_rx.clone()));
        }

        // Wait for shutdown
        if let Some(rx) = shutdown_rx {
            let _ = rx.await;
            info!("shutdown signal received");
        } else {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!("failed to listen for shutdown signal: {}", e),
            }
        }

        self.emit_event(EngineEvent::Stopped {
            reason: "shutdown signal".to_string(),
        });

        // Cancel future ticks, then wait for in-flight cycles to finish.
        let _ = stop_tx.send(true);
        for handle in handles {
            let _ = handle.await;
        }

        self.state_store.flush().await?;
        info!("state flushed, engine stopped");

        Ok(())
    }

    /// Spawn the task owning one source: initial seed, then the polling loop
    fn spawn_source_task(
        &self,
        source: SourceConfig,
        mut stop_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let broadcaster = Arc::clone(&self.broadcaster);
        let state_store = Arc::clone(&self.state_store);
        let fetch_timeout = self.fetch_timeout;
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            initialize_source(
                &source,
                fetcher.as_ref(),
                state_store.as_ref(),
                fetch_timeout,
                &event_tx,
            )
            .await;

            let period = source.interval();
            // First tick one full period after the seed fetch.
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            // Delayed ticks are not compensated: at least the configured
            // interval between cycles, never a burst of catch-up polls.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            debug!(source = %source.id, "polling every {:?}", period);

            loop {
                if *stop_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        // The cycle runs inline, so this source can never
                        // overlap itself; a slow fetch simply delays its own
                        // next tick.
                        if let Err(e) = run_cycle(
                            &source,
                            fetcher.as_ref(),
                            broadcaster.as_ref(),
                            state_store.as_ref(),
                            fetch_timeout,
                            &event_tx,
                        )
                        .await
                        {
                            error!(source = %source.id, "cycle failed: {}", e);
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!(source = %source.id, "polling task stopped");
        })
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        emit(&self.event_tx, event);
    }
}

/// Seed one source's baseline from an initial fetch
///
/// A durable store that already holds a policy-compatible baseline for this
/// source is left alone, so a restart does not re-notify for changes that
/// were already broadcast. A failed initial fetch leaves the source unknown;
/// it joins change detection after its first successful poll.
async fn initialize_source(
    source: &SourceConfig,
    fetcher: &dyn Fetcher,
    state_store: &dyn StateStore,
    fetch_timeout: Duration,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    match state_store.get_comparison(&source.id).await {
        Ok(Some(existing)) if existing.matches_policy(source.policy) => {
            info!(source = %source.id, "resuming from stored baseline");
            return;
        }
        Ok(Some(_)) => {
            warn!(
                source = %source.id,
                "stored baseline does not match the configured policy, re-seeding"
            );
        }
        Ok(None) => {}
        Err(e) => {
            error!(source = %source.id, "state store read failed at startup: {}", e);
            return;
        }
    }

    match fetch_with_timeout(fetcher, &source.fetch_key, fetch_timeout).await {
        Ok(fetched) => {
            let state = seeded_state(source, &fetched);
            if let Err(e) = state_store.commit(&source.id, &state).await {
                error!(source = %source.id, "failed to commit initial state: {}", e);
                return;
            }
            info!(source = %source.id, "initialized from initial fetch");
            emit(
                event_tx,
                EngineEvent::SourceInitialized {
                    source_id: source.id.clone(),
                },
            );
        }
        Err(e) => {
            warn!(
                source = %source.id,
                "initial fetch failed, source stays unknown until a poll succeeds: {}", e
            );
            emit(
                event_tx,
                EngineEvent::InitialFetchFailed {
                    source_id: source.id.clone(),
                    error: e.to_string(),
                },
            );
        }
    }
}

/// One polling cycle for one source
///
/// Fetch failures abandon the cycle with the state untouched; the next
/// scheduled tick is the retry.
async fn run_cycle(
    source: &SourceConfig,
    fetcher: &dyn Fetcher,
    broadcaster: &dyn Broadcaster,
    state_store: &dyn StateStore,
    fetch_timeout: Duration,
    event_tx: &mpsc::Sender<EngineEvent>,
) -> Result<()> {
    let fetched = match fetch_with_timeout(fetcher, &source.fetch_key, fetch_timeout).await {
        Ok(result) => result,
        Err(e) => {
            warn!(source = %source.id, "fetch failed: {}", e);
            emit(
                event_tx,
                EngineEvent::FetchFailed {
                    source_id: source.id.clone(),
                    error: e.to_string(),
                },
            );
            return Ok(());
        }
    };

    let Some(previous) = state_store.get_comparison(&source.id).await? else {
        // First successful poll for a source whose startup fetch failed:
        // seed the baseline without notifying.
        state_store
            .commit(&source.id, &seeded_state(source, &fetched))
            .await?;
        info!(source = %source.id, "initialized on first successful poll");
        emit(
            event_tx,
            EngineEvent::SourceInitialized {
                source_id: source.id.clone(),
            },
        );
        return Ok(());
    };

    if !previous.matches_policy(source.policy) {
        warn!(
            source = %source.id,
            "stored baseline does not match the configured policy, re-seeding"
        );
        state_store
            .commit(&source.id, &seeded_state(source, &fetched))
            .await?;
        return Ok(());
    }

    match detector::detect(source, &previous, &fetched) {
        Detection::Unchanged => {
            debug!(source = %source.id, "no change");
            Ok(())
        }
        Detection::Changed(change) => {
            // Commit before broadcasting: a failed delivery must not lead to
            // the same change being detected and re-sent on the next cycle.
            let state = SourceState::new(change.value, change.item);
            state_store.commit(&source.id, &state).await?;

            info!(source = %source.id, "change detected: {}", change.message);
            emit(
                event_tx,
                EngineEvent::ChangeDetected {
                    source_id: source.id.clone(),
                    message: change.message.clone(),
                },
            );

            match broadcaster.send(&change.message).await {
                Ok(()) => {
                    debug!(source = %source.id, "notification delivered");
                    emit(
                        event_tx,
                        EngineEvent::NotificationSent {
                            source_id: source.id.clone(),
                        },
                    );
                }
                Err(e) => {
                    // The new baseline is already committed; the notification
                    // is dropped rather than retried.
                    warn!(source = %source.id, "broadcast failed, notification lost: {}", e);
                    emit(
                        event_tx,
                        EngineEvent::BroadcastFailed {
                            source_id: source.id.clone(),
                            error: e.to_string(),
                        },
                    );
                }
            }

            Ok(())
        }
    }
}

/// The baseline committed when a source is (re-)seeded
fn seeded_state(source: &SourceConfig, fetched: &FetchResult) -> SourceState {
    SourceState::new(
        detector::seed(source.policy, fetched),
        fetched.newest().cloned(),
    )
}

/// Fetch with the mandatory per-fetch timeout
async fn fetch_with_timeout(
    fetcher: &dyn Fetcher,
    key: &str,
    timeout: Duration,
) -> Result<FetchResult> {
    match tokio::time::timeout(timeout, fetcher.fetch(key)).await {
        Ok(result) => result,
        Err(_) => Err(crate::Error::fetch(format!(
            "timed out after {:?}",
            timeout
        ))),
    }
}

/// Emit an event, dropping it with a warning when the channel is full
///
/// Dropping keeps a polling cycle from ever blocking on a slow event consumer.
fn emit(event_tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    if event_tx.try_send(event).is_err() {
        warn!("event channel full, dropping event. Consider increasing event_channel_capacity.");
    }
}
