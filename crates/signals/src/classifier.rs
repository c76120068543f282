use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use common::{AssetSignal, Band, Direction, Snapshot, Timeframe, MAX_LAYER};

/// Lower bounds (inclusive) of each band above OVERSOLD.
pub const WEAK_MIN: f64 = 30.0;
pub const NEUTRAL_MIN: f64 = 40.0;
pub const STRONG_MIN: f64 = 60.0;
pub const OVERBOUGHT_MIN: f64 = 70.0;

/// Data-integrity violation reported by the upstream service.
///
/// These are never supported inputs. The classifier clamps them so the
/// dashboard keeps rendering, and records them so they stay visible.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Defect {
    RsiOutOfRange { symbol: String, value: f64 },
    SmoothedRsiOutOfRange { symbol: String, value: f64 },
    LayerOutOfRange { symbol: String, direction: Direction, value: i32 },
    DuplicateSymbol { symbol: String },
}

/// An asset with its locally derived band and display-safe layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedAsset {
    pub asset: AssetSignal,
    pub band: Band,
    pub long_layer: u8,
    pub short_layer: u8,
}

impl ClassifiedAsset {
    pub fn layer(&self, direction: Direction) -> u8 {
        match direction {
            Direction::Long => self.long_layer,
            Direction::Short => self.short_layer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSnapshot {
    pub timeframe: Timeframe,
    pub limit: u32,
    pub fetched_at: DateTime<Utc>,
    pub total_assets: usize,
    /// Same order as the source snapshot.
    pub assets: Vec<ClassifiedAsset>,
    pub defects: Vec<Defect>,
}

impl ClassifiedSnapshot {
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }
}

/// Band for an RSI value in [0, 100]; `None` for anything else, NaN included.
pub fn band_for_rsi(rsi: f64) -> Option<Band> {
    if !(0.0..=100.0).contains(&rsi) {
        return None;
    }
    let band = if rsi >= OVERBOUGHT_MIN {
        Band::Overbought
    } else if rsi >= STRONG_MIN {
        Band::Strong
    } else if rsi >= NEUTRAL_MIN {
        Band::Neutral
    } else if rsi >= WEAK_MIN {
        Band::Weak
    } else {
        Band::Oversold
    };
    Some(band)
}

/// Band used for display when the RSI is out of domain: finite values clamp
/// to the nearest edge, NaN reads as NEUTRAL.
fn clamped_band(rsi: f64) -> Band {
    if rsi.is_nan() {
        return Band::Neutral;
    }
    band_for_rsi(rsi.clamp(0.0, 100.0)).unwrap_or(Band::Neutral)
}

fn clamped_layer(raw: i32) -> u8 {
    raw.clamp(0, MAX_LAYER as i32) as u8
}

/// Derive RSI-band membership and validated layers for every asset.
///
/// No asset is ever dropped: out-of-domain values are clamped for display
/// and reported in [`ClassifiedSnapshot::defects`].
pub fn classify(snapshot: &Snapshot) -> ClassifiedSnapshot {
    let mut defects = Vec::new();
    let mut seen: HashSet<&str> = HashSet::with_capacity(snapshot.assets.len());

    let assets = snapshot
        .assets
        .iter()
        .map(|asset| {
            if !seen.insert(asset.symbol.as_str()) {
                defects.push(Defect::DuplicateSymbol {
                    symbol: asset.symbol.clone(),
                });
            }

            let band = band_for_rsi(asset.rsi).unwrap_or_else(|| {
                defects.push(Defect::RsiOutOfRange {
                    symbol: asset.symbol.clone(),
                    value: asset.rsi,
                });
                clamped_band(asset.rsi)
            });

            if !(0.0..=100.0).contains(&asset.rsi_smoothed) {
                defects.push(Defect::SmoothedRsiOutOfRange {
                    symbol: asset.symbol.clone(),
                    value: asset.rsi_smoothed,
                });
            }

            for direction in [Direction::Long, Direction::Short] {
                let raw = asset.raw_layer(direction);
                if !(0..=MAX_LAYER as i32).contains(&raw) {
                    defects.push(Defect::LayerOutOfRange {
                        symbol: asset.symbol.clone(),
                        direction,
                        value: raw,
                    });
                }
            }

            ClassifiedAsset {
                asset: asset.clone(),
                band,
                long_layer: clamped_layer(asset.long_layer),
                short_layer: clamped_layer(asset.short_layer),
            }
        })
        .collect();

    for defect in &defects {
        warn!(?defect, timeframe = %snapshot.timeframe, "Upstream data-integrity defect");
    }

    ClassifiedSnapshot {
        timeframe: snapshot.timeframe,
        limit: snapshot.limit,
        fetched_at: snapshot.fetched_at,
        total_assets: snapshot.total_assets,
        assets,
        defects,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use common::FetchRequest;

    use super::*;

    fn asset(symbol: &str, rsi: f64) -> AssetSignal {
        AssetSignal {
            symbol: symbol.into(),
            name: symbol.into(),
            price: 1.0,
            price_change_24h: 0.0,
            rsi,
            rsi_smoothed: rsi,
            ema_13: 1.0,
            ema_21: 1.0,
            market_cap_rank: None,
            long_layer: 0,
            short_layer: 0,
        }
    }

    fn snapshot(assets: Vec<AssetSignal>) -> Snapshot {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Snapshot::new(FetchRequest::new(Timeframe::H4, 50), at, assets)
    }

    #[test]
    fn band_boundaries_are_lower_inclusive() {
        assert_eq!(band_for_rsi(0.0), Some(Band::Oversold));
        assert_eq!(band_for_rsi(29.999), Some(Band::Oversold));
        assert_eq!(band_for_rsi(30.0), Some(Band::Weak));
        assert_eq!(band_for_rsi(40.0), Some(Band::Neutral));
        assert_eq!(band_for_rsi(59.99), Some(Band::Neutral));
        assert_eq!(band_for_rsi(60.0), Some(Band::Strong));
        assert_eq!(band_for_rsi(70.0), Some(Band::Overbought));
        assert_eq!(band_for_rsi(100.0), Some(Band::Overbought));
    }

    #[test]
    fn out_of_domain_rsi_has_no_band() {
        assert_eq!(band_for_rsi(-0.01), None);
        assert_eq!(band_for_rsi(100.01), None);
        assert_eq!(band_for_rsi(f64::NAN), None);
    }

    #[test]
    fn example_snapshot_bands() {
        let rsis = [55.3, 35.8, 72.5, 25.2, 48.7];
        let snap = snapshot(
            rsis.iter()
                .enumerate()
                .map(|(i, &r)| asset(&format!("A{i}"), r))
                .collect(),
        );
        let classified = classify(&snap);
        let bands: Vec<Band> = classified.assets.iter().map(|a| a.band).collect();
        assert_eq!(
            bands,
            vec![Band::Neutral, Band::Weak, Band::Overbought, Band::Oversold, Band::Neutral]
        );
        assert!(classified.is_clean());
    }

    #[test]
    fn out_of_range_rsi_is_clamped_and_flagged() {
        let snap = snapshot(vec![asset("HOT", 104.0), asset("COLD", -3.0), asset("NAN", f64::NAN)]);
        let classified = classify(&snap);

        assert_eq!(classified.assets.len(), 3, "no asset may be dropped");
        assert_eq!(classified.assets[0].band, Band::Overbought);
        assert_eq!(classified.assets[1].band, Band::Oversold);
        assert_eq!(classified.assets[2].band, Band::Neutral);
        assert!(classified
            .defects
            .contains(&Defect::RsiOutOfRange { symbol: "HOT".into(), value: 104.0 }));
        assert!(classified
            .defects
            .contains(&Defect::RsiOutOfRange { symbol: "COLD".into(), value: -3.0 }));
        assert!(classified.defects.iter().any(|d| matches!(
            d,
            Defect::RsiOutOfRange { symbol, .. } if symbol == "NAN"
        )));
    }

    #[test]
    fn layers_are_clamped_and_flagged() {
        let mut bad = asset("BAD", 50.0);
        bad.long_layer = 7;
        bad.short_layer = -1;
        let classified = classify(&snapshot(vec![bad]));

        let entry = &classified.assets[0];
        assert_eq!(entry.long_layer, 5);
        assert_eq!(entry.short_layer, 0);
        assert_eq!(classified.defects.len(), 2);
    }

    #[test]
    fn duplicate_symbols_are_flagged_but_kept() {
        let classified = classify(&snapshot(vec![asset("ETH", 50.0), asset("ETH", 51.0)]));
        assert_eq!(classified.assets.len(), 2);
        assert_eq!(
            classified.defects,
            vec![Defect::DuplicateSymbol { symbol: "ETH".into() }]
        );
    }

    #[test]
    fn both_directions_may_carry_a_signal() {
        let mut both = asset("DUAL", 50.0);
        both.long_layer = 1;
        both.short_layer = 2;
        let classified = classify(&snapshot(vec![both]));
        assert!(classified.is_clean());
        assert_eq!(classified.assets[0].layer(Direction::Long), 1);
        assert_eq!(classified.assets[0].layer(Direction::Short), 2);
    }
}
