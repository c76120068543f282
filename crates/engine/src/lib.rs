pub mod client;
pub mod controller;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use client::{HttpSnapshotClient, MAX_SERVICE_LIMIT};
pub use controller::{Dashboard, DashboardCommand, DashboardHandle, DashboardView, SnapshotSummary, ViewState};
pub use scheduler::{
    Completion, RefreshScheduler, SchedulerConfig, SchedulerEvent, Trigger, MIN_REFRESH_INTERVAL,
};
