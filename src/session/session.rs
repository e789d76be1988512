use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::{run_tick, CachedStrategy, EvaluatorCache, PriceTracker};
use crate::gateway::MarketGateway;
use crate::models::{SessionStatus, SessionSummary};
use crate::rules::{RuleParseError, StrategyEvaluator};

/// Caller-supplied session parameters.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub name: String,
    pub owner_id: Option<String>,
    /// Optional rule-set payload binding a fixed strategy to this session,
    /// overriding the per-bot strategies from the store.
    pub rules: Option<serde_json::Value>,
    /// Fixed RNG seed for reproducible runs. Fresh entropy when absent.
    pub rng_seed: Option<u64>,
}

struct SessionState {
    status: SessionStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    last_tick_at: Option<DateTime<Utc>>,
    last_tick_duration_ms: Option<u64>,
    tick_count: u64,
    last_error: Option<String>,
}

/// One independently-lifecycled tick loop with its own price history,
/// evaluator cache, and RNG.
///
/// Lifecycle: starting → running → stopping → stopped (terminal). `start`
/// is idempotent; `stop` is cooperative: it never interrupts a tick in
/// flight, only cuts the inter-tick sleep short and prevents the next tick.
pub struct BotSession {
    id: String,
    name: String,
    owner_id: Option<String>,
    state: Arc<Mutex<SessionState>>,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    gateway: Arc<dyn MarketGateway>,
    engine: EngineConfig,
    bound_strategy: Option<Arc<CachedStrategy>>,
    rng_seed: Option<u64>,
}

impl BotSession {
    /// Construct a session in the `starting` state. Rule-set parse errors
    /// surface here, synchronously, before any loop exists.
    pub fn new(
        config: SessionConfig,
        engine: EngineConfig,
        gateway: Arc<dyn MarketGateway>,
    ) -> Result<Self, RuleParseError> {
        let bound_strategy = match &config.rules {
            Some(payload) => {
                let evaluator = StrategyEvaluator::from_payload(payload)?;
                Some(Arc::new(CachedStrategy::new(evaluator)))
            }
            None => None,
        };

        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: config.name,
            owner_id: config.owner_id,
            state: Arc::new(Mutex::new(SessionState {
                status: SessionStatus::Starting,
                created_at: Utc::now(),
                started_at: None,
                stopped_at: None,
                last_tick_at: None,
                last_tick_duration_ms: None,
                tick_count: 0,
                last_error: None,
            })),
            stop_tx,
            handle: Mutex::new(None),
            gateway,
            engine,
            bound_strategy,
            rng_seed: config.rng_seed,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().unwrap().status
    }

    /// A session is active until it begins stopping; only active sessions
    /// are eligible for owner reuse.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status(),
            SessionStatus::Starting | SessionStatus::Running
        )
    }

    /// Transition starting → running and spawn the loop exactly once.
    /// Calling again while running is a no-op.
    pub fn start(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap();
            if state.status != SessionStatus::Starting {
                return;
            }
            state.status = SessionStatus::Running;
            state.started_at = Some(Utc::now());
        }

        let mut handle = self.handle.lock().unwrap();
        if handle.is_none() {
            let session = Arc::clone(self);
            *handle = Some(tokio::spawn(async move { session.run_loop().await }));
            tracing::info!(session = %self.id, name = %self.name, "session started");
        }
    }

    /// Signal the loop to stop after its current tick. Idempotent.
    pub fn stop(&self) {
        let has_loop = self.handle.lock().unwrap().is_some();
        {
            let mut state = self.state.lock().unwrap();
            match state.status {
                SessionStatus::Stopping | SessionStatus::Stopped => return,
                SessionStatus::Starting | SessionStatus::Running => {
                    state.status = SessionStatus::Stopping;
                    // Never started a loop: nothing to wait for.
                    if !has_loop {
                        state.status = SessionStatus::Stopped;
                        state.stopped_at = Some(Utc::now());
                    }
                }
            }
        }
        let _ = self.stop_tx.send(true);
        tracing::info!(session = %self.id, "session stopping");
    }

    /// Await the loop task after a `stop`. Used by shutdown paths and tests.
    pub async fn wait_until_stopped(&self) {
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let state = self.state.lock().unwrap();
        SessionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            owner_id: self.owner_id.clone(),
            status: state.status,
            created_at: state.created_at,
            started_at: state.started_at,
            stopped_at: state.stopped_at,
            last_tick_at: state.last_tick_at,
            last_tick_duration_ms: state.last_tick_duration_ms,
            tick_count: state.tick_count,
            last_error: state.last_error.clone(),
        }
    }

    async fn run_loop(self: Arc<Self>) {
        let mut stop_rx = self.stop_tx.subscribe();
        let mut tracker = PriceTracker::new();
        let mut cache = EvaluatorCache::new();
        let mut rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let tick_started = Instant::now();
            let result = run_tick(
                self.gateway.as_ref(),
                &mut tracker,
                &mut cache,
                self.bound_strategy.as_deref(),
                &self.engine,
                &mut rng,
            )
            .await;
            let duration_ms = tick_started.elapsed().as_millis() as u64;

            {
                let mut state = self.state.lock().unwrap();
                state.last_tick_at = Some(Utc::now());
                state.last_tick_duration_ms = Some(duration_ms);
                state.tick_count += 1;
                match &result {
                    // A successful tick clears a previously recorded error.
                    Ok(_) => state.last_error = None,
                    Err(e) => state.last_error = Some(format!("{e:#}")),
                }
            }

            match result {
                Ok(outcome) => tracing::info!(
                    session = %self.id,
                    duration_ms,
                    cancelled = outcome.cancelled,
                    inserted = outcome.inserted,
                    "tick complete"
                ),
                // A failed tick never terminates the session; the next
                // scheduled tick retries against fresh store state.
                Err(e) => tracing::error!(session = %self.id, error = %e, "tick failed"),
            }

            let sleep_ms = self
                .engine
                .tick_interval_ms
                .saturating_sub(duration_ms)
                .max(self.engine.min_rest_delay_ms);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(sleep_ms)) => {}
                _ = stop_rx.changed() => {}
            }
        }

        let mut state = self.state.lock().unwrap();
        state.status = SessionStatus::Stopped;
        state.stopped_at = Some(Utc::now());
        tracing::info!(session = %self.id, ticks = state.tick_count, "session stopped");
    }
}
