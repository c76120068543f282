use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::time::Instant;

use common::{AssetSignal, CancelToken, FetchError, FetchRequest, Snapshot, SnapshotSource};

type Script = dyn Fn(usize, FetchRequest) -> (Duration, Result<Snapshot, FetchError>) + Send + Sync;

/// Source that answers each call from a script and records what it was asked.
pub struct ScriptedSource {
    calls: Mutex<Vec<(Instant, FetchRequest)>>,
    script: Box<Script>,
}

impl ScriptedSource {
    /// `script(call_index, request)` returns the delay and the outcome.
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(usize, FetchRequest) -> (Duration, Result<Snapshot, FetchError>) + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.calls.lock().unwrap().iter().map(|(_, r)| *r).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch(
        &self,
        request: FetchRequest,
        cancel: CancelToken,
    ) -> Result<Snapshot, FetchError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((Instant::now(), request));
            calls.len() - 1
        };
        let (delay, outcome) = (self.script)(index, request);
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => outcome,
        }
    }
}

pub fn asset(symbol: &str, rsi: f64, long_layer: i32, short_layer: i32) -> AssetSignal {
    AssetSignal {
        symbol: symbol.into(),
        name: symbol.into(),
        price: 100.0,
        price_change_24h: 0.0,
        rsi,
        rsi_smoothed: rsi,
        ema_13: 100.0,
        ema_21: 100.0,
        market_cap_rank: Some(1),
        long_layer,
        short_layer,
    }
}

pub fn snapshot_for(request: FetchRequest, assets: Vec<AssetSignal>) -> Snapshot {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    Snapshot::new(request, at, assets)
}
