//! The dispatch engine: a background loop that ticks over every active
//! subscription, sends what is new, and backs off when its dependencies fail.

pub mod backoff;
pub mod dispatch;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::app::Result;
use crate::config::interval::format_interval;
use crate::fetcher::http_fetcher::DEFAULT_FETCH_TIMEOUT;
use crate::notifier::webhook::DEFAULT_DELIVERY_TIMEOUT;

pub use backoff::Backoff;
pub use dispatch::{decide, Decision, DispatchContext, Outcome, TickReport};

pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub tick_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Subscriptions processed concurrently within one tick.
    pub workers: usize,
    pub fetch_timeout: Duration,
    pub delivery_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
            workers: DEFAULT_WORKERS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    Stopping,
}

struct Lifecycle {
    state: EngineState,
    token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

/// Owns the background tick loop and its lifecycle.
pub struct Engine {
    config: EngineConfig,
    lifecycle: Mutex<Lifecycle>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: EngineState::Stopped,
                token: None,
                handle: None,
            }),
        }
    }

    pub fn state(&self) -> EngineState {
        self.lifecycle().state
    }

    /// Spawn the tick loop. Returns `false` without doing anything if the
    /// engine is not stopped.
    pub fn start(&self, ctx: Arc<DispatchContext>) -> bool {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != EngineState::Stopped {
            debug!("Engine already {:?}, ignoring start", lifecycle.state);
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(ctx, self.config, token.clone()));

        lifecycle.state = EngineState::Running;
        lifecycle.token = Some(token);
        lifecycle.handle = Some(handle);
        true
    }

    /// Ask the loop to stop and wait for the in-flight tick to wind down.
    pub async fn stop(&self) {
        let (token, handle) = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state != EngineState::Running {
                return;
            }
            lifecycle.state = EngineState::Stopping;
            (lifecycle.token.take(), lifecycle.handle.take())
        };

        if let Some(token) = token {
            token.cancel();
        }
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Engine task ended abnormally: {}", e);
            }
        }

        self.lifecycle().state = EngineState::Stopped;
    }

    /// Run exactly one tick in the foreground.
    pub async fn run_once(&self, ctx: &Arc<DispatchContext>) -> Result<TickReport> {
        dispatch::run_tick(ctx, &self.config, &CancellationToken::new()).await
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn run_loop(ctx: Arc<DispatchContext>, config: EngineConfig, token: CancellationToken) {
    info!(
        "Dispatch engine started (tick interval: {}, workers: {})",
        format_interval(config.tick_interval.as_secs()),
        config.workers
    );

    let mut backoff = Backoff::new(config.backoff_base, config.backoff_max);

    while !token.is_cancelled() {
        let delay = match dispatch::run_tick(&ctx, &config, &token).await {
            Ok(report) => {
                backoff.reset();
                if report.dispatched() > 0 {
                    info!(
                        "Tick complete: {} sent, {} failed fetches",
                        report.dispatched(),
                        report.fetch_failed
                    );
                } else {
                    debug!("Tick complete: {:?}", report);
                }
                config.tick_interval
            }
            Err(e) => {
                let delay = backoff.next_delay();
                error!("Tick failed: {}; retrying in {:?}", e, delay);
                delay
            }
        };

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!("Dispatch engine stopped");
}
