use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use common::{
    AssetSignal, CancelToken, Error, FetchError, FetchRequest, Result, Snapshot, SnapshotSource,
};

const SNAPSHOT_PATH: &str = "api/heatmap";
/// Largest `limit` the signal service accepts; larger values are rejected
/// upstream with 422.
pub const MAX_SERVICE_LIMIT: u32 = 250;

/// HTTP client for the signal service. Issues exactly one GET per fetch.
pub struct HttpSnapshotClient {
    endpoint: Url,
    http: Client,
}

impl HttpSnapshotClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| Error::Config(format!("invalid signal service URL '{base_url}': {e}")))?;
        let endpoint = base
            .join(SNAPSHOT_PATH)
            .map_err(|e| Error::Config(e.to_string()))?;

        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self { endpoint, http })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full request URL. The limit is capped at what the service accepts;
    /// the snapshot still records the limit that was asked for.
    pub fn request_url(&self, request: FetchRequest) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("timeframe", request.timeframe.as_str())
            .append_pair("limit", &request.limit.min(MAX_SERVICE_LIMIT).to_string());
        url
    }

    async fn get(&self, request: FetchRequest) -> Result<Snapshot, FetchError> {
        let url = self.request_url(request);
        debug!(timeframe = %request.timeframe, limit = request.limit, %url, "Requesting snapshot");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        parse_response(request, status, &body, Utc::now())
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotClient {
    async fn fetch(
        &self,
        request: FetchRequest,
        cancel: CancelToken,
    ) -> Result<Snapshot, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(timeframe = %request.timeframe, "Snapshot request cancelled in flight");
                Err(FetchError::Cancelled)
            }
            result = self.get(request) => result,
        }
    }
}

/// Turn an HTTP status and body into a snapshot or a classified failure.
pub fn parse_response(
    request: FetchRequest,
    status: StatusCode,
    body: &str,
    received_at: DateTime<Utc>,
) -> Result<Snapshot, FetchError> {
    let parsed = serde_json::from_str::<SnapshotResponse>(body);

    if status == StatusCode::TOO_MANY_REQUESTS {
        let tag = parsed
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| "rate_limit".to_string());
        return Err(FetchError::RateLimited(tag));
    }

    if !status.is_success() {
        return Err(match parsed.ok().and_then(|r| r.error) {
            Some(message) => FetchError::from_upstream_message(message),
            None => FetchError::Upstream(format!("HTTP {status}")),
        });
    }

    let resp = parsed.map_err(|e| FetchError::Decode(e.to_string()))?;

    if !resp.success {
        let message = resp
            .error
            .unwrap_or_else(|| "service reported failure without detail".to_string());
        return Err(FetchError::from_upstream_message(message));
    }

    if let Some(echo) = resp.timeframe.as_deref() {
        if echo != request.timeframe.as_str() {
            warn!(requested = %request.timeframe, echoed = echo, "Service echoed a different timeframe");
        }
    }

    let fetched_at = resp
        .updated_at
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or(received_at);

    let total_assets = resp.total_coins.unwrap_or(resp.signals.len());

    Ok(Snapshot {
        timeframe: request.timeframe,
        limit: request.limit,
        fetched_at,
        total_assets,
        assets: resp.signals,
    })
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SnapshotResponse {
    success: bool,
    #[serde(default)]
    timeframe: Option<String>,
    #[serde(default)]
    total_coins: Option<usize>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default, alias = "data")]
    signals: Vec<AssetSignal>,
    #[serde(default)]
    error: Option<String>,
}
