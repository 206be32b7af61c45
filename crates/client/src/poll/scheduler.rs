//! Polling session scheduler.
//!
//! Owns one background task per session. The task multiplexes the periodic
//! interval, visibility transitions, and caller commands, and applies the
//! transitions from [`crate::poll::state`]. Teardown goes through a
//! cancellation token and a bounded join so a restart can never leave a
//! stale timer or listener behind.
//!
//! Two caller-visible flags are published over watch channels:
//! - `refreshing`: true while a refresh (and its minimum display hold) is
//!   underway, for a subtle "updating" indicator.
//! - `loading_overlay`: true between a mutation that requested a full
//!   overlay and the matching [`PollScheduler::loading_complete`] call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::poll::state::{step, Effect, PollEvent, PollState};
use crate::poll::visibility::VisibilitySignal;

/// Maximum time to wait for a session task to acknowledge cancellation.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Asynchronous refresh operation driven by the scheduler.
///
/// Errors are logged and swallowed; a failed refresh never tears the
/// session down, the next tick simply tries again.
#[async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self) -> anyhow::Result<()>;
}

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Tick period. `Duration::ZERO` disables periodic polling entirely;
    /// the session still starts and still serves commands.
    pub interval: Duration,
    /// Minimum time the `refreshing` flag stays raised for a
    /// visibility-resume refresh, so the indicator does not flicker.
    pub min_refresh_display: Duration,
    /// Debounce window for post-mutation refreshes without an overlay.
    pub post_success_delay: Duration,
    /// Identity of the inputs the refresh operation closes over. When these
    /// change the session is restarted, see
    /// [`PollScheduler::sync_dependencies`].
    pub dependencies: Vec<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            min_refresh_display: Duration::from_secs(2),
            post_success_delay: Duration::from_secs(2),
            dependencies: Vec::new(),
        }
    }
}

/// Errors from session lifecycle operations.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Poll session is already running")]
    AlreadyRunning,

    #[error("Poll session is not running")]
    NotRunning,

    #[error("Poll session task panicked")]
    TaskPanicked,

    #[error("Poll session task did not stop within {STOP_TIMEOUT:?}")]
    StopTimeout,
}

enum PollCommand {
    Refresh,
    OperationSuccess { show_overlay: bool },
    LoadingComplete,
}

/// Visibility-aware polling scheduler.
///
/// One scheduler drives one refresh operation. `start` spawns the session
/// task; `stop` cancels it and waits for it to finish. Commands sent while
/// no session is running are dropped with a debug log.
pub struct PollScheduler {
    refresher: Arc<dyn Refresh>,
    visibility: VisibilitySignal,
    config: PollConfig,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
    commands: StdMutex<Option<mpsc::UnboundedSender<PollCommand>>>,
    refreshing: Arc<watch::Sender<bool>>,
    overlay: Arc<watch::Sender<bool>>,
    in_flight: Arc<AtomicBool>,
}

impl PollScheduler {
    pub fn new(
        refresher: Arc<dyn Refresh>,
        visibility: VisibilitySignal,
        config: PollConfig,
    ) -> Self {
        let (refreshing, _) = watch::channel(false);
        let (overlay, _) = watch::channel(false);
        Self {
            refresher,
            visibility,
            config,
            cancel: CancellationToken::new(),
            task: Arc::new(Mutex::new(None)),
            commands: StdMutex::new(None),
            refreshing: Arc::new(refreshing),
            overlay: Arc::new(overlay),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a polling session.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::AlreadyRunning`] if a session is active.
    pub async fn start(&mut self) -> Result<(), PollError> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(PollError::AlreadyRunning);
        }

        self.cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        *self.commands.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        let session = Session {
            refresher: Arc::clone(&self.refresher),
            config: self.config.clone(),
            visibility: self.visibility.subscribe(),
            commands: rx,
            cancel: self.cancel.clone(),
            refreshing: Arc::clone(&self.refreshing),
            overlay: Arc::clone(&self.overlay),
            in_flight: Arc::clone(&self.in_flight),
            state: PollState::Idle,
            ticker: None,
            pending_refresh: None,
            visibility_open: true,
            commands_open: true,
        };
        *task = Some(tokio::spawn(session.run()));
        info!(interval = ?self.config.interval, "poll session started");
        Ok(())
    }

    /// Stop the running session and wait for its task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::NotRunning`] if no session is active, or a
    /// teardown error if the task panicked or failed to stop in time.
    pub async fn stop(&mut self) -> Result<(), PollError> {
        let handle = self.task.lock().await.take().ok_or(PollError::NotRunning)?;

        self.cancel.cancel();
        *self.commands.lock().unwrap_or_else(PoisonError::into_inner) = None;

        match timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(error = %error, "poll session task panicked during stop");
                return Err(PollError::TaskPanicked);
            }
            Err(_) => {
                warn!("poll session task did not stop in time");
                return Err(PollError::StopTimeout);
            }
        }

        // Reset caller-visible state so a restart begins clean.
        self.refreshing.send_replace(false);
        self.overlay.send_replace(false);
        self.in_flight.store(false, Ordering::SeqCst);
        info!("poll session stopped");
        Ok(())
    }

    /// Whether a session task is currently alive.
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Request an immediate refresh. No-op while a refresh is already in
    /// flight or no session is running.
    pub fn trigger_refresh(&self) {
        if self.in_flight.load(Ordering::SeqCst) {
            debug!("refresh already in flight, ignoring trigger");
            return;
        }
        self.send(PollCommand::Refresh);
    }

    /// Report a successful mutation.
    ///
    /// With `show_overlay` the loading overlay flag is raised and the data
    /// refresh is deferred until [`Self::loading_complete`]. Without it, a
    /// refresh is scheduled after the configured delay; repeated calls
    /// within the window coalesce into one refresh timed from the latest
    /// call.
    pub fn notify_operation_success(&self, show_overlay: bool) {
        let delivered = self.send(PollCommand::OperationSuccess { show_overlay });
        // The flag is only raised once a live session holds the matching
        // command; otherwise nothing would ever lower it again.
        if show_overlay && delivered {
            self.overlay.send_replace(true);
        }
    }

    /// Signal that the loading overlay has finished its exit. Runs exactly
    /// one refresh and lowers the overlay flag. Ignored when no overlay is
    /// showing.
    pub fn loading_complete(&self) {
        if !*self.overlay.borrow() {
            debug!("loading_complete without an active overlay, ignoring");
            return;
        }
        self.send(PollCommand::LoadingComplete);
    }

    /// Restart the session when the refresh operation's inputs changed.
    ///
    /// Returns `Ok(false)` without touching the session when `dependencies`
    /// matches the current set. Otherwise stops the running session (if
    /// any), stores the new set, and starts a fresh session.
    pub async fn sync_dependencies(&mut self, dependencies: Vec<u64>) -> Result<bool, PollError> {
        if self.config.dependencies == dependencies {
            return Ok(false);
        }

        info!("poll dependencies changed, restarting session");
        if self.is_running().await {
            self.stop().await?;
        }
        self.config.dependencies = dependencies;
        self.start().await?;
        Ok(true)
    }

    /// Receiver for the `refreshing` indicator flag.
    pub fn refreshing(&self) -> watch::Receiver<bool> {
        self.refreshing.subscribe()
    }

    /// Receiver for the loading overlay flag.
    pub fn loading_overlay(&self) -> watch::Receiver<bool> {
        self.overlay.subscribe()
    }

    /// Returns true when the command was delivered to a live session.
    fn send(&self, command: PollCommand) -> bool {
        let guard = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => {
                let delivered = sender.send(command).is_ok();
                if !delivered {
                    debug!("poll session gone, dropping command");
                }
                delivered
            }
            None => {
                debug!("no active poll session, dropping command");
                false
            }
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        // Best-effort cancellation; the task notices on its next poll.
        self.cancel.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshKind {
    Tick,
    Triggered,
    Resume,
    Debounced,
    AfterOverlay,
}

enum LoopAction {
    Shutdown,
    Tick,
    Visibility,
    VisibilityClosed,
    Command(PollCommand),
    CommandsClosed,
    Debounce,
}

struct Session {
    refresher: Arc<dyn Refresh>,
    config: PollConfig,
    visibility: watch::Receiver<bool>,
    commands: mpsc::UnboundedReceiver<PollCommand>,
    cancel: CancellationToken,
    refreshing: Arc<watch::Sender<bool>>,
    overlay: Arc<watch::Sender<bool>>,
    in_flight: Arc<AtomicBool>,
    state: PollState,
    ticker: Option<time::Interval>,
    pending_refresh: Option<Instant>,
    visibility_open: bool,
    commands_open: bool,
}

impl Session {
    async fn run(mut self) {
        if !self.config.interval.is_zero() {
            self.apply(PollEvent::Started).await;
            if *self.visibility.borrow_and_update() {
                self.apply(PollEvent::Hidden).await;
            }
        }

        loop {
            let deadline = self.pending_refresh;
            let action = tokio::select! {
                () = self.cancel.cancelled() => LoopAction::Shutdown,
                () = tick_or_pending(&mut self.ticker) => LoopAction::Tick,
                changed = self.visibility.changed(), if self.visibility_open => {
                    match changed {
                        Ok(()) => LoopAction::Visibility,
                        Err(_) => LoopAction::VisibilityClosed,
                    }
                }
                command = self.commands.recv(), if self.commands_open => {
                    match command {
                        Some(command) => LoopAction::Command(command),
                        None => LoopAction::CommandsClosed,
                    }
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => LoopAction::Debounce,
            };

            match action {
                LoopAction::Shutdown => {
                    self.apply(PollEvent::Stopped).await;
                    debug!("poll session shutting down");
                    break;
                }
                LoopAction::Tick => self.run_refresh(RefreshKind::Tick).await,
                LoopAction::Visibility => {
                    let hidden = *self.visibility.borrow_and_update();
                    let event = if hidden { PollEvent::Hidden } else { PollEvent::Visible };
                    self.apply(event).await;
                }
                LoopAction::VisibilityClosed => {
                    debug!("visibility signal dropped, freezing at last known state");
                    self.visibility_open = false;
                }
                LoopAction::Command(command) => self.handle_command(command).await,
                LoopAction::CommandsClosed => self.commands_open = false,
                LoopAction::Debounce => {
                    self.pending_refresh = None;
                    self.run_refresh(RefreshKind::Debounced).await;
                }
            }
        }
    }

    async fn apply(&mut self, event: PollEvent) {
        let (next, effect) = step(self.state, event);
        if next != self.state {
            debug!(from = ?self.state, to = ?next, event = ?event, "poll transition");
        }
        self.state = next;

        match effect {
            Effect::None => {}
            Effect::ArmInterval => self.arm(),
            Effect::Disarm => self.ticker = None,
            Effect::RefreshAndArm => {
                // Refresh first so the interval is measured from the resume
                // refresh, not from whenever the surface was hidden.
                self.run_refresh(RefreshKind::Resume).await;
                self.arm();
            }
        }
    }

    async fn handle_command(&mut self, command: PollCommand) {
        match command {
            PollCommand::Refresh => self.run_refresh(RefreshKind::Triggered).await,
            PollCommand::OperationSuccess { show_overlay: true } => {
                // Overlay raised by the scheduler; the refresh waits for
                // loading_complete.
            }
            PollCommand::OperationSuccess { show_overlay: false } => {
                self.pending_refresh = Some(Instant::now() + self.config.post_success_delay);
            }
            PollCommand::LoadingComplete => {
                self.run_refresh(RefreshKind::AfterOverlay).await;
                self.overlay.send_replace(false);
            }
        }
    }

    async fn run_refresh(&mut self, kind: RefreshKind) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(kind = ?kind, "refresh already in flight, skipping");
            return;
        }

        let started = Instant::now();
        self.refreshing.send_replace(true);

        // Teardown must not wait out a slow refresh, so the callback and
        // the indicator hold both race against cancellation. The loop
        // observes the token on its next pass and shuts down.
        tokio::select! {
            () = self.cancel.cancelled() => {
                debug!(kind = ?kind, "refresh interrupted by teardown");
            }
            result = self.refresher.refresh() => {
                if let Err(error) = result {
                    warn!(error = %error, kind = ?kind, "refresh failed");
                }
                if kind == RefreshKind::Resume {
                    // Hold the indicator long enough to be perceptible.
                    tokio::select! {
                        () = self.cancel.cancelled() => {}
                        () = sleep_until(started + self.config.min_refresh_display) => {}
                    }
                }
            }
        }

        self.refreshing.send_replace(false);
        self.in_flight.store(false, Ordering::SeqCst);
    }

    fn arm(&mut self) {
        let period = self.config.interval;
        if period.is_zero() {
            return;
        }
        // interval_at so the first tick fires one full period from now
        // instead of immediately.
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
    }
}

async fn tick_or_pending(ticker: &mut Option<time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct CountingRefresh {
        calls: AtomicUsize,
    }

    impl CountingRefresh {
        fn new() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Refresh for CountingRefresh {
        async fn refresh(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn scheduler_with(refresher: Arc<CountingRefresh>, interval: Duration) -> PollScheduler {
        PollScheduler::new(
            refresher,
            VisibilitySignal::new(),
            PollConfig { interval, ..PollConfig::default() },
        )
    }

    // Lets the session task observe commands under the paused clock.
    async fn settle() {
        time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_round_trip() {
        let refresher = CountingRefresh::new();
        let mut scheduler = scheduler_with(refresher, Duration::from_secs(30));

        assert!(!scheduler.is_running().await);
        scheduler.start().await.unwrap();
        assert!(scheduler.is_running().await);
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_is_rejected() {
        let refresher = CountingRefresh::new();
        let mut scheduler = scheduler_with(refresher, Duration::from_secs(30));

        scheduler.start().await.unwrap();
        assert!(matches!(scheduler.start().await, Err(PollError::AlreadyRunning)));
        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_session_is_rejected() {
        let refresher = CountingRefresh::new();
        let mut scheduler = scheduler_with(refresher, Duration::from_secs(30));

        assert!(matches!(scheduler.stop().await, Err(PollError::NotRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_disables_ticks_but_serves_commands() {
        let refresher = CountingRefresh::new();
        let mut scheduler = scheduler_with(Arc::clone(&refresher), Duration::ZERO);

        scheduler.start().await.unwrap();
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(refresher.calls(), 0);

        scheduler.trigger_refresh();
        settle().await;
        assert_eq!(refresher.calls(), 1);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sync_dependencies_ignores_identical_set() {
        let refresher = CountingRefresh::new();
        let mut scheduler = scheduler_with(refresher, Duration::from_secs(30));
        scheduler.config.dependencies = vec![1, 2];

        scheduler.start().await.unwrap();
        assert!(!scheduler.sync_dependencies(vec![1, 2]).await.unwrap());
        assert!(scheduler.is_running().await);
        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sync_dependencies_restarts_on_change() {
        let refresher = CountingRefresh::new();
        let mut scheduler = scheduler_with(refresher, Duration::from_secs(30));

        scheduler.start().await.unwrap();
        assert!(scheduler.sync_dependencies(vec![7]).await.unwrap());
        assert!(scheduler.is_running().await);
        assert_eq!(scheduler.config.dependencies, vec![7]);
        scheduler.stop().await.unwrap();
    }
}
