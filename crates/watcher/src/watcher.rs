use crate::debounce::DebounceState;
use crate::filter::{is_relevant, observe_options};
use crate::suppression::{Suppression, SuppressionGuard};
use crate::{Result, WatcherError};
use boardlens_dom::{MutationListener, MutationRecord, NodeId, ObserverId, SharedDocument};
use boardlens_engine::{load_settings, BoardEngine, BoardMarkup, PassOutcome, PassReport, SettingsStore};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};

const INITIAL_REASON: &str = "initial";
const MUTATION_REASON: &str = "mutation";
const BOARD_RETRY_REASON: &str = "board-not-ready";
const SIGNAL_CAPACITY: usize = 1024;

/// Exponential backoff with a cap and a bounded number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoardWatcherConfig {
    pub debounce: Duration,
    pub max_batch_wait: Duration,
    /// How long observation stays suppressed after a pass finished writing.
    pub grace_period: Duration,
    /// Waiting for the board container to appear.
    pub container_retry: RetryPolicy,
    /// Re-running passes while no card is visible.
    pub board_retry: RetryPolicy,
}

impl Default for BoardWatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            max_batch_wait: Duration::from_secs(3),
            grace_period: Duration::from_millis(100),
            container_retry: RetryPolicy {
                attempts: 30,
                initial_delay: Duration::from_millis(250),
                max_delay: Duration::from_secs(1),
            },
            board_retry: RetryPolicy {
                attempts: 5,
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(4),
            },
        }
    }
}

impl BoardWatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.debounce.is_zero() {
            return Err(WatcherError::InvalidConfig("debounce must be non-zero".into()));
        }
        if self.max_batch_wait < self.debounce {
            return Err(WatcherError::InvalidConfig(
                "max_batch_wait must not be shorter than debounce".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Pending,
    Applying,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatcherHealth {
    pub state: LoopState,
    pub observing: bool,
    pub stopped: bool,
    pub passes: u64,
    pub last_pass: Option<SystemTime>,
    pub last_duration_ms: Option<u64>,
    pub last_outcome: Option<PassOutcome>,
    pub pending_events: usize,
    pub discarded_mutations: u64,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl WatcherHealth {
    const fn initial() -> Self {
        Self {
            state: LoopState::Idle,
            observing: false,
            stopped: false,
            passes: 0,
            last_pass: None,
            last_duration_ms: None,
            last_outcome: None,
            pending_events: 0,
            discarded_mutations: 0,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PassUpdate {
    pub completed_at: SystemTime,
    pub duration_ms: u64,
    pub reason: String,
    pub report: Option<PassReport>,
    pub error: Option<String>,
}

impl PassUpdate {
    #[must_use]
    pub fn outcome(&self) -> Option<PassOutcome> {
        self.report.as_ref().map(|report| report.outcome)
    }
}

/// Handle to the change-detection loop of one board. Clones share the loop;
/// dropping the last one stops it.
#[derive(Clone)]
pub struct BoardWatcher {
    inner: Arc<BoardWatcherInner>,
}

struct BoardWatcherInner {
    command_tx: mpsc::Sender<WatcherCommand>,
    update_tx: broadcast::Sender<PassUpdate>,
    health_tx: watch::Sender<WatcherHealth>,
    _health_guard: watch::Receiver<WatcherHealth>,
}

enum WatcherCommand {
    Trigger { reason: String },
    Shutdown,
}

impl BoardWatcher {
    /// Spawns the loop on the current tokio runtime. Settings are re-read
    /// from `store` before every pass.
    pub fn start(
        document: SharedDocument,
        engine: BoardEngine,
        store: Arc<dyn SettingsStore>,
        config: BoardWatcherConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(16);
        let (health_tx, health_rx) = watch::channel(WatcherHealth::initial());
        let (update_tx, _) = broadcast::channel(32);

        let markup = engine.config().markup.clone();
        let context = LoopContext {
            document,
            engine,
            store,
            config,
            markup,
            suppression: Suppression::new(),
            signal_tx,
            signal_rx,
            command_rx,
            update_tx: update_tx.clone(),
            health_tx: health_tx.clone(),
            health: WatcherHealth::initial(),
        };
        tokio::spawn(run_loop(context));

        Ok(Self {
            inner: Arc::new(BoardWatcherInner {
                command_tx,
                update_tx,
                health_tx,
                _health_guard: health_rx,
            }),
        })
    }

    /// Requests a pass as soon as the loop is free.
    pub async fn trigger(&self, reason: impl Into<String>) -> Result<()> {
        self.inner
            .command_tx
            .send(WatcherCommand::Trigger {
                reason: reason.into(),
            })
            .await
            .map_err(|e| WatcherError::Other(format!("failed to send trigger: {e}")))?;
        Ok(())
    }

    /// Stops observing and cancels pending timers; a pass already running
    /// finishes first. Resolves once the loop has exited.
    pub async fn stop(&self) -> Result<()> {
        let mut health = self.inner.health_tx.subscribe();
        if self.inner.command_tx.send(WatcherCommand::Shutdown).await.is_err() {
            return Ok(());
        }
        health
            .wait_for(|h| h.stopped)
            .await
            .map_err(|e| WatcherError::Other(format!("watcher exited unexpectedly: {e}")))?;
        Ok(())
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<PassUpdate> {
        self.inner.update_tx.subscribe()
    }

    #[must_use]
    pub fn health_snapshot(&self) -> WatcherHealth {
        self.inner.health_tx.subscribe().borrow().clone()
    }

    #[must_use]
    pub fn health_stream(&self) -> watch::Receiver<WatcherHealth> {
        self.inner.health_tx.subscribe()
    }
}

impl Drop for BoardWatcher {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(WatcherCommand::Shutdown);
        }
    }
}

struct LoopContext {
    document: SharedDocument,
    engine: BoardEngine,
    store: Arc<dyn SettingsStore>,
    config: BoardWatcherConfig,
    markup: BoardMarkup,
    suppression: Suppression,
    signal_tx: mpsc::Sender<()>,
    signal_rx: mpsc::Receiver<()>,
    command_rx: mpsc::Receiver<WatcherCommand>,
    update_tx: broadcast::Sender<PassUpdate>,
    health_tx: watch::Sender<WatcherHealth>,
    health: WatcherHealth,
}

enum ContainerWait {
    Found(NodeId),
    Shutdown,
    GaveUp(u32),
    Failed(WatcherError),
}

impl LoopContext {
    fn publish(&mut self) {
        self.health.discarded_mutations = self.suppression.discarded();
        let _ = self.health_tx.send(self.health.clone());
    }

    fn lock_document(&self) -> Result<std::sync::MutexGuard<'_, boardlens_dom::Document>> {
        self.document
            .lock()
            .map_err(|_| WatcherError::Other("document lock poisoned".into()))
    }

    fn find_container(&self) -> Result<Option<NodeId>> {
        let doc = self.lock_document()?;
        Ok(self
            .markup
            .board_containers
            .iter()
            .find_map(|selector| doc.query(doc.root(), selector)))
    }

    async fn wait_for_container(&mut self) -> ContainerWait {
        let policy = self.config.container_retry;
        let mut attempt = 0;
        loop {
            match self.find_container() {
                Ok(Some(container)) => return ContainerWait::Found(container),
                Ok(None) => {}
                Err(err) => return ContainerWait::Failed(err),
            }
            if attempt >= policy.attempts {
                return ContainerWait::GaveUp(attempt);
            }
            let delay = policy.delay(attempt);
            attempt += 1;
            debug!("Board container not found; retry {attempt} in {delay:?}");

            tokio::select! {
                () = time::sleep(delay) => {}
                cmd = self.command_rx.recv() => match cmd {
                    Some(WatcherCommand::Trigger { .. }) => {}
                    Some(WatcherCommand::Shutdown) | None => return ContainerWait::Shutdown,
                }
            }
        }
    }

    /// Subscribes to the container. The listener runs synchronously inside
    /// document writes, so it only classifies and signals.
    fn attach_observer(&self, container: NodeId) -> Result<ObserverId> {
        let markup = self.markup.clone();
        let suppression = self.suppression.clone();
        let signal_tx = self.signal_tx.clone();
        let listener: MutationListener = Arc::new(move |record: &MutationRecord| {
            if !is_relevant(&markup, record) {
                return;
            }
            if suppression.is_active() {
                suppression.record_discard();
                return;
            }
            // A full channel already guarantees a pending pass.
            let _ = signal_tx.try_send(());
        });
        let mut doc = self.lock_document()?;
        Ok(doc.observe(container, observe_options(), listener)?)
    }

    fn detach_observer(&self, observer: ObserverId) {
        match self.lock_document() {
            Ok(mut doc) => {
                doc.disconnect(observer);
            }
            Err(err) => warn!("Failed to disconnect board observer: {err}"),
        }
    }

    fn execute_pass(&mut self) -> Result<PassReport> {
        let settings = load_settings(self.store.as_ref())?;
        let mut doc = self
            .document
            .lock()
            .map_err(|_| WatcherError::Other("document lock poisoned".into()))?;
        Ok(self.engine.run_pass(&mut doc, &settings))
    }

    fn drain_signals(&mut self) -> usize {
        let mut drained = 0;
        while self.signal_rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }

    fn finish(&mut self) {
        self.health.state = LoopState::Idle;
        self.health.observing = false;
        self.health.pending_events = 0;
        self.health.stopped = true;
        self.publish();
    }
}

#[allow(clippy::too_many_lines)]
async fn run_loop(mut ctx: LoopContext) {
    let container = match ctx.wait_for_container().await {
        ContainerWait::Found(container) => container,
        ContainerWait::Shutdown => {
            ctx.finish();
            return;
        }
        ContainerWait::GaveUp(attempts) => {
            let err = WatcherError::ContainerNotFound(attempts);
            error!("{err}");
            ctx.health.last_error = Some(err.to_string());
            ctx.finish();
            return;
        }
        ContainerWait::Failed(err) => {
            error!("Board watcher failed to start: {err}");
            ctx.health.last_error = Some(err.to_string());
            ctx.finish();
            return;
        }
    };
    let observer = match ctx.attach_observer(container) {
        Ok(observer) => observer,
        Err(err) => {
            error!("Failed to observe board container: {err}");
            ctx.health.last_error = Some(err.to_string());
            ctx.finish();
            return;
        }
    };
    info!("Observing board container {container}");
    ctx.health.observing = true;

    let mut state = DebounceState::new(ctx.config.debounce, ctx.config.max_batch_wait);
    state.force_run(INITIAL_REASON.to_string());
    ctx.health.state = LoopState::Pending;
    ctx.publish();

    let mut grace: Option<(Instant, SuppressionGuard)> = None;
    let mut board_attempts: u32 = 0;

    loop {
        let next_deadline = state.next_deadline();
        let grace_deadline = grace.as_ref().map(|(until, _)| *until);

        tokio::select! {
            Some(()) = ctx.signal_rx.recv() => {
                if grace.is_some() {
                    ctx.suppression.record_discard();
                    continue;
                }
                state.record_event(1, MUTATION_REASON);
                ctx.health.state = LoopState::Pending;
                ctx.health.pending_events = state.pending();
                ctx.publish();
            }
            Some(cmd) = ctx.command_rx.recv() => {
                match cmd {
                    WatcherCommand::Trigger { reason } => {
                        state.force_run(reason);
                        if grace.is_none() {
                            ctx.health.state = LoopState::Pending;
                        }
                        ctx.health.pending_events = state.pending();
                        ctx.publish();
                    }
                    WatcherCommand::Shutdown => break,
                }
            }
            () = async {
                if let Some(deadline) = grace_deadline {
                    time::sleep_until(deadline).await;
                }
            }, if grace_deadline.is_some() => {
                grace = None;
                let stale = ctx.drain_signals();
                for _ in 0..stale {
                    ctx.suppression.record_discard();
                }
                ctx.health.state = if state.should_run() {
                    LoopState::Pending
                } else {
                    LoopState::Idle
                };
                ctx.publish();
            }
            () = async {
                if let Some(deadline) = next_deadline {
                    time::sleep_until(deadline).await;
                }
            }, if grace.is_none() && state.should_run() && next_deadline.is_some() => {
                let reason = state
                    .take_reason()
                    .unwrap_or_else(|| MUTATION_REASON.to_string());
                state.reset();
                ctx.health.state = LoopState::Applying;
                ctx.health.pending_events = 0;
                ctx.publish();

                let guard = ctx.suppression.enter();
                let started = Instant::now();
                let result = ctx.execute_pass();
                let duration_ms =
                    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

                ctx.health.passes += 1;
                ctx.health.last_pass = Some(SystemTime::now());
                ctx.health.last_duration_ms = Some(duration_ms);
                let update = match result {
                    Ok(report) => {
                        ctx.health.last_outcome = Some(report.outcome);
                        ctx.health.consecutive_failures = 0;
                        ctx.health.last_error = report.annotations.failures.first().cloned();
                        match report.outcome {
                            PassOutcome::Applied => board_attempts = 0,
                            PassOutcome::BoardNotReady => {
                                if board_attempts < ctx.config.board_retry.attempts {
                                    let delay = ctx.config.board_retry.delay(board_attempts);
                                    board_attempts += 1;
                                    debug!("Board not ready; retry {board_attempts} in {delay:?}");
                                    state.schedule_retry(delay, BOARD_RETRY_REASON);
                                } else if board_attempts == ctx.config.board_retry.attempts {
                                    board_attempts += 1;
                                    warn!("Board still has no visible cards; waiting for changes");
                                }
                            }
                        }
                        PassUpdate {
                            completed_at: SystemTime::now(),
                            duration_ms,
                            reason,
                            report: Some(report),
                            error: None,
                        }
                    }
                    Err(err) => {
                        error!("Board pass failed: {err}");
                        ctx.health.consecutive_failures += 1;
                        ctx.health.last_error = Some(err.to_string());
                        PassUpdate {
                            completed_at: SystemTime::now(),
                            duration_ms,
                            reason,
                            report: None,
                            error: Some(err.to_string()),
                        }
                    }
                };
                let _ = ctx.update_tx.send(update);
                ctx.publish();

                grace = Some((Instant::now() + ctx.config.grace_period, guard));
            }
            else => break,
        }
    }

    drop(grace);
    ctx.detach_observer(observer);
    info!("Board watcher stopped");
    ctx.finish();
}
