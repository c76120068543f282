use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use common::{
    BandFilter, Direction, Error, FetchRequest, FetchStatus, Result, SnapshotSource, SortField,
    SortSpec, Timeframe,
};
use signals::{
    classify, group_by_layer, layout, view, ClassifiedAsset, ClassifiedSnapshot, Defect,
    LayoutConfig, PositionedItem, Rect, ViewMode, ViewQuery,
};

use crate::scheduler::{Completion, RefreshScheduler, SchedulerConfig, SchedulerEvent, Trigger};

/// Interaction commands sent to the running dashboard.
#[derive(Debug, Clone)]
pub enum DashboardCommand {
    SetDirection(Direction),
    SetTimeframe(Timeframe),
    SetLimit(u32),
    SetBandFilter(BandFilter),
    /// Toggle order when the field is already selected, else select it.
    SetSort(SortField),
    RefreshNow,
    Stop,
}

/// User-controlled parameters plus fetch lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub direction: Direction,
    pub timeframe: Timeframe,
    pub limit: u32,
    pub band_filter: BandFilter,
    pub sort: SortSpec,
    pub status: FetchStatus,
    /// Label of the last successful fetch, e.g. `12:04:31 UTC`.
    pub last_updated: Option<String>,
}

impl ViewState {
    fn new(initial: FetchRequest) -> Self {
        Self {
            direction: Direction::default(),
            timeframe: initial.timeframe,
            limit: initial.limit,
            band_filter: BandFilter::All,
            sort: SortSpec {
                field: SortField::Rank,
                order: SortField::Rank.default_order(),
            },
            status: FetchStatus::Idle,
            last_updated: None,
        }
    }

    fn request(&self) -> FetchRequest {
        FetchRequest::new(self.timeframe, self.limit)
    }

    fn query(&self, mode: ViewMode) -> ViewQuery {
        ViewQuery {
            direction: self.direction,
            band_filter: self.band_filter,
            sort: self.sort,
            mode,
        }
    }
}

/// Metadata of the snapshot currently on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub timeframe: Timeframe,
    pub limit: u32,
    pub fetched_at: DateTime<Utc>,
    pub total_assets: usize,
    pub defects: Vec<Defect>,
}

/// Everything the presentation layer renders. Published whole after each
/// change; never mutated once sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub state: ViewState,
    pub snapshot: Option<SnapshotSummary>,
    /// Flat, filtered and sorted table rows.
    pub rows: Vec<ClassifiedAsset>,
    /// Banded view for the current direction, positioned.
    pub placements: Vec<PositionedItem>,
    pub band_rect: Rect,
}

/// Cloneable handle passed to other crates (HTTP API, binary).
#[derive(Clone)]
pub struct DashboardHandle {
    command_tx: mpsc::Sender<DashboardCommand>,
    view_rx: watch::Receiver<Arc<DashboardView>>,
}

impl DashboardHandle {
    pub async fn send(&self, cmd: DashboardCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            debug!("Dashboard is no longer running; command dropped");
        }
    }

    pub async fn set_direction(&self, direction: Direction) {
        self.send(DashboardCommand::SetDirection(direction)).await;
    }

    pub async fn set_timeframe(&self, timeframe: Timeframe) {
        self.send(DashboardCommand::SetTimeframe(timeframe)).await;
    }

    pub async fn set_limit(&self, limit: u32) -> Result<()> {
        if limit == 0 {
            return Err(Error::InvalidParameter("limit must be a positive integer".into()));
        }
        self.send(DashboardCommand::SetLimit(limit)).await;
        Ok(())
    }

    pub async fn set_band_filter(&self, filter: BandFilter) {
        self.send(DashboardCommand::SetBandFilter(filter)).await;
    }

    pub async fn set_sort(&self, field: SortField) {
        self.send(DashboardCommand::SetSort(field)).await;
    }

    pub async fn refresh_now(&self) {
        self.send(DashboardCommand::RefreshNow).await;
    }

    pub async fn stop(&self) {
        self.send(DashboardCommand::Stop).await;
    }

    /// Latest published view.
    pub fn view(&self) -> Arc<DashboardView> {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardView>> {
        self.view_rx.clone()
    }
}

/// Owns the view state and the current snapshot, and runs the refresh loop.
///
/// All state changes happen on the single task running [`Dashboard::run`];
/// fetches run on their own tasks and report back through the scheduler.
pub struct Dashboard {
    state: ViewState,
    snapshot: Option<ClassifiedSnapshot>,
    scheduler: RefreshScheduler,
    layout: LayoutConfig,
    command_rx: mpsc::Receiver<DashboardCommand>,
    view_tx: watch::Sender<Arc<DashboardView>>,
}

impl Dashboard {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        initial: FetchRequest,
        scheduler_cfg: SchedulerConfig,
        layout: LayoutConfig,
    ) -> (Self, DashboardHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = ViewState::new(initial);
        let (view_tx, view_rx) = watch::channel(Arc::new(DashboardView {
            state: state.clone(),
            snapshot: None,
            rows: Vec::new(),
            placements: Vec::new(),
            band_rect: layout.band_rect(),
        }));

        let dashboard = Dashboard {
            state,
            snapshot: None,
            scheduler: RefreshScheduler::new(source, scheduler_cfg),
            layout,
            command_rx,
            view_tx,
        };
        let handle = DashboardHandle {
            command_tx,
            view_rx,
        };
        (dashboard, handle)
    }

    /// Run until stopped or every handle is dropped. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(timeframe = %self.state.timeframe, limit = self.state.limit, "Dashboard activated");
        self.scheduler.start();
        self.begin_fetch(Trigger::Mount);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(DashboardCommand::Stop) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                event = self.scheduler.next_event() => match event {
                    SchedulerEvent::Due(trigger) => self.begin_fetch(trigger),
                    SchedulerEvent::Completed(completion) => self.handle_completion(completion),
                },
            }
        }

        self.scheduler.stop();
        info!("Dashboard deactivated");
    }

    fn handle_command(&mut self, cmd: DashboardCommand) {
        debug!(?cmd, "Dashboard command");
        match cmd {
            DashboardCommand::SetDirection(direction) => {
                if self.state.direction == direction {
                    return;
                }
                self.state.direction = direction;
            }
            DashboardCommand::SetTimeframe(timeframe) => {
                if self.state.timeframe == timeframe {
                    return;
                }
                self.state.timeframe = timeframe;
                self.scheduler.params_changed();
            }
            DashboardCommand::SetLimit(limit) => {
                if limit == 0 {
                    warn!("Ignoring zero limit");
                    return;
                }
                if self.state.limit == limit {
                    return;
                }
                self.state.limit = limit;
                self.scheduler.params_changed();
            }
            DashboardCommand::SetBandFilter(filter) => {
                if self.state.band_filter == filter {
                    return;
                }
                self.state.band_filter = filter;
            }
            DashboardCommand::SetSort(field) => {
                self.state.sort = if self.state.sort.field == field {
                    SortSpec {
                        field,
                        order: self.state.sort.order.toggled(),
                    }
                } else {
                    SortSpec {
                        field,
                        order: field.default_order(),
                    }
                };
            }
            DashboardCommand::RefreshNow => {
                self.begin_fetch(Trigger::Manual);
                return;
            }
            DashboardCommand::Stop => return,
        }
        self.publish();
    }

    fn begin_fetch(&mut self, trigger: Trigger) {
        if trigger == Trigger::Manual {
            // The manual fetch already uses the latest parameters.
            self.scheduler.cancel_debounce();
        }
        let generation = self.scheduler.begin(trigger, self.state.request());
        debug!(generation, ?trigger, "Fetch started");
        self.state.status = FetchStatus::Loading;
        self.publish();
    }

    fn handle_completion(&mut self, completion: Completion) {
        let Some(completion) = self.scheduler.settle(completion) else {
            return;
        };
        let request = completion.request;

        match completion.result {
            Ok(snapshot) => {
                let classified = classify(&snapshot);
                info!(
                    timeframe = %request.timeframe,
                    assets = classified.assets.len(),
                    defects = classified.defects.len(),
                    "Snapshot applied"
                );
                self.state.last_updated =
                    Some(classified.fetched_at.format("%H:%M:%S UTC").to_string());
                self.snapshot = Some(classified);
                self.state.status = FetchStatus::Ok;
            }
            Err(e) if e.is_cancelled() => {
                debug!("Authoritative fetch reported cancellation; ignoring");
                return;
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, timeframe = %request.timeframe, "Snapshot fetch rate limited");
                self.state.status = FetchStatus::Warning("Rate limited by upstream".into());
            }
            Err(e) => {
                error!(error = %e, timeframe = %request.timeframe, "Snapshot fetch failed");
                self.state.status = FetchStatus::Error(e.to_string());
            }
        }
        self.publish();
    }

    /// Recompute the derived view from state and snapshot, then broadcast it.
    fn publish(&self) {
        let band_rect = self.layout.band_rect();
        let (summary, rows, placements) = match &self.snapshot {
            Some(snapshot) => {
                let rows = view(snapshot, &self.state.query(ViewMode::Flat));
                let banded = view(snapshot, &self.state.query(ViewMode::Banded));
                let bands = group_by_layer(&banded, self.state.direction);
                let placements = layout(&bands, band_rect, &self.layout);
                let summary = SnapshotSummary {
                    timeframe: snapshot.timeframe,
                    limit: snapshot.limit,
                    fetched_at: snapshot.fetched_at,
                    total_assets: snapshot.total_assets,
                    defects: snapshot.defects.clone(),
                };
                (Some(summary), rows, placements)
            }
            None => (None, Vec::new(), Vec::new()),
        };

        self.view_tx.send_replace(Arc::new(DashboardView {
            state: self.state.clone(),
            snapshot: summary,
            rows,
            placements,
            band_rect,
        }));
    }
}
