use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info};

use common::{
    AssetSignal, CancelToken, FetchError, FetchRequest, Snapshot, SnapshotSource, Timeframe,
};

/// Symbol, name and reference price, ordered by market cap.
const UNIVERSE: &[(&str, &str, f64)] = &[
    ("BTC", "Bitcoin", 64_000.0),
    ("ETH", "Ethereum", 3_100.0),
    ("USDT", "Tether", 1.0),
    ("BNB", "BNB", 580.0),
    ("SOL", "Solana", 150.0),
    ("XRP", "XRP", 0.52),
    ("USDC", "USD Coin", 1.0),
    ("DOGE", "Dogecoin", 0.16),
    ("TON", "Toncoin", 6.8),
    ("ADA", "Cardano", 0.45),
    ("AVAX", "Avalanche", 35.0),
    ("SHIB", "Shiba Inu", 0.000024),
    ("DOT", "Polkadot", 7.1),
    ("LINK", "Chainlink", 14.5),
    ("TRX", "TRON", 0.12),
    ("BCH", "Bitcoin Cash", 470.0),
    ("NEAR", "NEAR Protocol", 6.2),
    ("MATIC", "Polygon", 0.72),
    ("LTC", "Litecoin", 84.0),
    ("ICP", "Internet Computer", 12.0),
    ("UNI", "Uniswap", 9.8),
    ("APT", "Aptos", 8.9),
    ("ETC", "Ethereum Classic", 27.0),
    ("XLM", "Stellar", 0.11),
    ("ATOM", "Cosmos", 8.4),
    ("FIL", "Filecoin", 5.9),
    ("ARB", "Arbitrum", 1.05),
    ("OP", "Optimism", 2.4),
    ("INJ", "Injective", 26.0),
    ("HBAR", "Hedera", 0.09),
];

/// Maximum absolute 24h change, in percent.
const MAX_CHANGE_PCT: f64 = 12.0;
const NOISE: f64 = 6.0;

/// Offline snapshot source that synthesises plausible signals.
///
/// RSI is derived from a random 24h change plus noise, and the long/short
/// layers follow the same threshold ladder the live service uses, so the
/// dashboard behaves as it would against real data. Seeded, so a given
/// sequence of requests always yields the same snapshots.
pub struct DemoSource {
    rng: Mutex<StdRng>,
    latency: Duration,
}

impl DemoSource {
    pub fn new(seed: u64) -> Self {
        info!(seed, universe = UNIVERSE.len(), "DemoSource initialized");
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            latency: Duration::ZERO,
        }
    }

    /// Delay every answer by `latency`, to exercise loading states.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn generate(&self, request: FetchRequest) -> Vec<AssetSignal> {
        let mut rng = self.rng.lock().await;
        let count = (request.limit as usize).min(UNIVERSE.len());
        let noise_scale = noise_scale(request.timeframe);

        UNIVERSE
            .iter()
            .take(count)
            .enumerate()
            .map(|(i, &(symbol, name, reference))| {
                let change = rng.random_range(-MAX_CHANGE_PCT..=MAX_CHANGE_PCT);
                let base = (50.0 + change * 1.5).clamp(15.0, 85.0);
                let rsi = (base + rng.random_range(-NOISE..=NOISE) * noise_scale).clamp(5.0, 95.0);
                let rsi_smoothed = (base + rng.random_range(-NOISE..=NOISE) * 0.5).clamp(5.0, 95.0);
                let price = reference * (1.0 + change / 100.0);
                let (long_layer, short_layer) = layers(rsi, change);

                AssetSignal {
                    symbol: symbol.to_string(),
                    name: name.to_string(),
                    price,
                    price_change_24h: round2(change),
                    rsi: round2(rsi),
                    rsi_smoothed: round2(rsi_smoothed),
                    ema_13: price * (1.0 - change / 100.0 * 0.3),
                    ema_21: price * (1.0 - change / 100.0 * 0.5),
                    market_cap_rank: Some(i as u32 + 1),
                    long_layer,
                    short_layer,
                }
            })
            .collect()
    }
}

#[async_trait]
impl SnapshotSource for DemoSource {
    async fn fetch(
        &self,
        request: FetchRequest,
        cancel: CancelToken,
    ) -> Result<Snapshot, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if !self.latency.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        }

        let assets = self.generate(request).await;
        debug!(timeframe = %request.timeframe, assets = assets.len(), "Demo snapshot generated");
        Ok(Snapshot::new(request, Utc::now(), assets))
    }
}

/// Longer timeframes wobble less.
fn noise_scale(timeframe: Timeframe) -> f64 {
    match timeframe {
        Timeframe::M15 | Timeframe::H1 | Timeframe::H4 => 1.0,
        Timeframe::H12 => 0.7,
        Timeframe::D1 | Timeframe::W1 => 0.5,
    }
}

/// Long/short strength ladder: deep RSI extremes always qualify, milder ones
/// only with a confirming 24h move.
fn layers(rsi: f64, change: f64) -> (i32, i32) {
    let long = if rsi <= 20.0 {
        5
    } else if rsi <= 30.0 {
        4
    } else if rsi <= 35.0 {
        3
    } else if rsi <= 40.0 && change < -3.0 {
        2
    } else if rsi <= 45.0 && change < -5.0 {
        1
    } else {
        0
    };

    let short = if rsi >= 80.0 {
        5
    } else if rsi >= 70.0 {
        4
    } else if rsi >= 65.0 {
        3
    } else if rsi >= 60.0 && change > 3.0 {
        2
    } else if rsi >= 55.0 && change > 5.0 {
        1
    } else {
        0
    };

    (long, short)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use common::CancelHandle;

    use super::*;

    #[test]
    fn ladder_matches_thresholds() {
        assert_eq!(layers(20.0, 0.0), (5, 0));
        assert_eq!(layers(30.0, 0.0), (4, 0));
        assert_eq!(layers(35.0, 0.0), (3, 0));
        assert_eq!(layers(38.0, -4.0), (2, 0));
        assert_eq!(layers(38.0, -1.0), (0, 0));
        assert_eq!(layers(44.0, -6.0), (1, 0));
        assert_eq!(layers(50.0, 0.0), (0, 0));
        assert_eq!(layers(56.0, 6.0), (0, 1));
        assert_eq!(layers(62.0, 4.0), (0, 2));
        assert_eq!(layers(62.0, 1.0), (0, 0));
        assert_eq!(layers(65.0, 0.0), (0, 3));
        assert_eq!(layers(70.0, 0.0), (0, 4));
        assert_eq!(layers(80.0, 0.0), (0, 5));
    }

    #[tokio::test]
    async fn same_seed_same_snapshot() {
        let request = FetchRequest::new(Timeframe::H4, 20);
        let (_live, token) = CancelHandle::new();
        let a = DemoSource::new(7).fetch(request, token.clone()).await.unwrap();
        let b = DemoSource::new(7).fetch(request, token).await.unwrap();
        assert_eq!(a.assets, b.assets);
    }

    #[tokio::test]
    async fn limit_is_capped_by_universe_and_values_in_domain() {
        let request = FetchRequest::new(Timeframe::D1, 500);
        let (_live, token) = CancelHandle::new();
        let snap = DemoSource::new(1).fetch(request, token).await.unwrap();
        assert_eq!(snap.assets.len(), UNIVERSE.len());
        assert_eq!(snap.total_assets, UNIVERSE.len());
        assert_eq!(snap.timeframe, Timeframe::D1);
        for (i, a) in snap.assets.iter().enumerate() {
            assert!((5.0..=95.0).contains(&a.rsi), "{} rsi {}", a.symbol, a.rsi);
            assert!((0..=5).contains(&a.long_layer));
            assert!((0..=5).contains(&a.short_layer));
            assert!(a.long_layer == 0 || a.short_layer == 0);
            assert_eq!(a.market_cap_rank, Some(i as u32 + 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_latency() {
        let source = DemoSource::new(3).with_latency(Duration::from_secs(10));
        let (handle, token) = CancelHandle::new();
        let fetch = tokio::spawn(async move {
            source.fetch(FetchRequest::new(Timeframe::H1, 5), token).await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
        let result = fetch.await.unwrap();
        assert_eq!(result.unwrap_err(), FetchError::Cancelled);
    }
}
