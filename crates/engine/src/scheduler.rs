use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use common::{CancelHandle, Config, FetchError, FetchRequest, Snapshot, SnapshotSource};

/// Shortest periodic interval the scheduler will arm.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Periodic refresh interval while active.
    pub interval: Duration,
    /// Quiet period after the last parameter change.
    pub debounce: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            debounce: Duration::from_millis(500),
        }
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            interval: cfg.refresh_interval,
            debounce: cfg.debounce,
        }
    }
}

/// What caused a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Mount,
    Periodic,
    Debounced,
    Manual,
}

/// A finished fetch, authoritative or not.
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub trigger: Trigger,
    pub request: FetchRequest,
    pub result: Result<Snapshot, FetchError>,
}

#[derive(Debug)]
pub enum SchedulerEvent {
    /// A timer fired; the owner should start a fetch with current parameters.
    Due(Trigger),
    Completed(Completion),
}

struct InFlight {
    generation: u64,
    cancel: CancelHandle,
}

/// Decides when fetches happen and which result is allowed through.
///
/// Most-recent-wins: every `begin` cancels the outstanding fetch and bumps
/// the generation; only a completion carrying the current generation is
/// handed back by `settle`. Everything else is dropped quietly.
///
/// The periodic timer and the debounce deadline are independent. Neither is
/// touched by fetch outcomes, so a failure never reschedules anything.
pub struct RefreshScheduler {
    source: Arc<dyn SnapshotSource>,
    config: SchedulerConfig,
    generation: u64,
    in_flight: Option<InFlight>,
    completed_tx: mpsc::UnboundedSender<Completion>,
    completed_rx: mpsc::UnboundedReceiver<Completion>,
    ticker: Option<Interval>,
    debounce_at: Option<Instant>,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn SnapshotSource>, config: SchedulerConfig) -> Self {
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            source,
            config,
            generation: 0,
            in_flight: None,
            completed_tx,
            completed_rx,
            ticker: None,
            debounce_at: None,
        }
    }

    /// Arm the periodic timer. The first tick is one interval from now; the
    /// owner fetches immediately on activation itself.
    pub fn start(&mut self) {
        let mut period = self.config.interval;
        if period < MIN_REFRESH_INTERVAL {
            warn!(requested = ?period, min = ?MIN_REFRESH_INTERVAL, "Refresh interval too short; clamping");
            period = MIN_REFRESH_INTERVAL;
        }
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        info!(interval = ?period, debounce = ?self.config.debounce, "Refresh scheduler started");
    }

    /// Cancel every timer and the outstanding fetch.
    pub fn stop(&mut self) {
        self.ticker = None;
        self.debounce_at = None;
        self.invalidate();
        info!("Refresh scheduler stopped");
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    /// Restart the debounce window. Ignored while stopped.
    pub fn params_changed(&mut self) {
        if self.is_active() {
            self.debounce_at = Some(Instant::now() + self.config.debounce);
        }
    }

    pub fn cancel_debounce(&mut self) {
        self.debounce_at = None;
    }

    pub fn has_pending_debounce(&self) -> bool {
        self.debounce_at.is_some()
    }

    pub fn in_flight_generation(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.generation)
    }

    /// Invalidate any outstanding fetch, then start a new one. Returns the
    /// generation that is now authoritative.
    pub fn begin(&mut self, trigger: Trigger, request: FetchRequest) -> u64 {
        self.invalidate();
        self.generation += 1;
        let generation = self.generation;

        let (cancel, token) = CancelHandle::new();
        let source = self.source.clone();
        let completed_tx = self.completed_tx.clone();

        debug!(generation, ?trigger, timeframe = %request.timeframe, limit = request.limit, "Starting fetch");
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(FetchError::Cancelled),
                result = source.fetch(request, token.clone()) => result,
            };
            // Receiver lives as long as the scheduler.
            let _ = completed_tx.send(Completion {
                generation,
                trigger,
                request,
                result,
            });
        });

        self.in_flight = Some(InFlight { generation, cancel });
        generation
    }

    fn invalidate(&mut self) {
        if let Some(prev) = self.in_flight.take() {
            debug!(generation = prev.generation, "Cancelling superseded fetch");
            prev.cancel.cancel();
        }
    }

    pub fn is_authoritative(&self, generation: u64) -> bool {
        self.in_flight_generation() == Some(generation)
    }

    /// Accept `completion` if it belongs to the current fetch. Stale results
    /// are discarded without being reported as errors.
    pub fn settle(&mut self, completion: Completion) -> Option<Completion> {
        if !self.is_authoritative(completion.generation) {
            debug!(
                generation = completion.generation,
                current = ?self.in_flight_generation(),
                "Discarding result of superseded fetch"
            );
            return None;
        }
        self.in_flight = None;
        Some(completion)
    }

    /// Wait for the next timer or fetch completion.
    pub async fn next_event(&mut self) -> SchedulerEvent {
        tokio::select! {
            Some(completion) = self.completed_rx.recv() => SchedulerEvent::Completed(completion),
            _ = wait_until(self.debounce_at) => {
                self.debounce_at = None;
                SchedulerEvent::Due(Trigger::Debounced)
            }
            _ = tick(self.ticker.as_mut()) => SchedulerEvent::Due(Trigger::Periodic),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
