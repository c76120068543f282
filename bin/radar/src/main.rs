use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{Config, SnapshotSource, SourceMode};
use demo::DemoSource;
use engine::{Dashboard, HttpSnapshotClient, SchedulerConfig};
use signals::LayoutConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(source = ?cfg.source_mode, timeframe = %cfg.default_timeframe, "RSI radar starting");

    let layout = match cfg.layout_config_path.as_deref() {
        Some(path) => LayoutConfig::load(path)
            .with_context(|| format!("loading layout config from {path}"))?,
        None => LayoutConfig::default(),
    };

    // ── Snapshot source (picked by SIGNAL_SOURCE) ────────────────────────────
    let source: Arc<dyn SnapshotSource> = match cfg.source_mode {
        SourceMode::Live => {
            info!(url = %cfg.signal_api_url, "Live mode, using signal service");
            Arc::new(
                HttpSnapshotClient::new(&cfg.signal_api_url, cfg.request_timeout)
                    .context("building signal service client")?,
            )
        }
        SourceMode::Demo => {
            info!("Demo mode, synthesising snapshots");
            Arc::new(DemoSource::new(std::process::id() as u64))
        }
    };

    // ── Dashboard ─────────────────────────────────────────────────────────────
    let (dashboard, handle) = Dashboard::new(
        source,
        cfg.initial_request(),
        SchedulerConfig::from(&cfg),
        layout,
    );
    let dashboard_task = tokio::spawn(dashboard.run());

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let api_state = api::AppState {
        dashboard: handle.clone(),
        token: cfg.dashboard_token.clone(),
    };
    let port = cfg.dashboard_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "Dashboard API stopped");
        }
    });

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    info!("Shutdown signal received. Stopping dashboard.");

    handle.stop().await;
    dashboard_task.await.context("dashboard task panicked")?;
    Ok(())
}
