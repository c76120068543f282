use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use common::{AssetSignal, MAX_LAYER};

use crate::LayoutConfig;

/// Phase advance between neighbours in a row. The golden angle keeps
/// consecutive items on alternating sides of the centre line.
const INDEX_PHASE: f64 = 2.399_963_229_728_653;
/// Phase offset per band so rows in adjacent bands do not wobble in step.
const BAND_PHASE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One asset placed inside its band. Rebuilt from scratch on every pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedItem {
    pub asset: AssetSignal,
    /// Strength band 1..=5.
    pub band: u8,
    /// Centre, in the coordinate space of the band rectangle.
    pub x: f64,
    pub y: f64,
    /// Rendering diameter derived from market-cap rank.
    pub size: f64,
}

/// Place the items of every band inside `band_rect`.
///
/// Bands are laid out independently. Each row is centred horizontally with
/// spacing `min(max_spacing, (width - margin) / n)`, and each item gets a
/// bounded sinusoidal vertical offset from its index and band number. The
/// result is a pure function of the inputs; crowded bands pack tighter and
/// may overlap. Keys outside 1..=5 are ignored.
pub fn layout(
    bands: &BTreeMap<u8, Vec<AssetSignal>>,
    band_rect: Rect,
    cfg: &LayoutConfig,
) -> Vec<PositionedItem> {
    bands
        .iter()
        .filter(|(band, _)| (1..=MAX_LAYER).contains(*band))
        .flat_map(|(&band, items)| place_band(band, items, band_rect, cfg))
        .collect()
}

fn place_band(
    band: u8,
    items: &[AssetSignal],
    rect: Rect,
    cfg: &LayoutConfig,
) -> Vec<PositionedItem> {
    let n = items.len();
    if n == 0 {
        return Vec::new();
    }

    let usable = (rect.width - cfg.margin).max(0.0);
    let spacing = cfg.max_spacing.min(usable / n as f64);
    let row_span = spacing * (n - 1) as f64;
    let start_x = rect.x + (rect.width - row_span) / 2.0;
    let mid_y = rect.y + rect.height / 2.0;

    items
        .iter()
        .enumerate()
        .map(|(i, asset)| {
            let size = cfg.size_for_rank(asset.rank());
            // Keep the whole bubble inside the band when it fits.
            let headroom = (rect.height / 2.0 - size / 2.0).max(0.0);
            let amplitude = (cfg.jitter * rect.height / 2.0).min(headroom);
            let phase = i as f64 * INDEX_PHASE + band as f64 * BAND_PHASE;

            PositionedItem {
                asset: asset.clone(),
                band,
                x: start_x + i as f64 * spacing,
                y: mid_y + amplitude * phase.sin(),
                size,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(symbol: &str, rank: Option<u32>) -> AssetSignal {
        AssetSignal {
            symbol: symbol.into(),
            name: symbol.into(),
            price: 1.0,
            price_change_24h: 0.0,
            rsi: 50.0,
            rsi_smoothed: 50.0,
            ema_13: 1.0,
            ema_21: 1.0,
            market_cap_rank: rank,
            long_layer: 1,
            short_layer: 0,
        }
    }

    fn row(n: usize) -> Vec<AssetSignal> {
        (0..n).map(|i| asset(&format!("S{i}"), Some(i as u32 + 1))).collect()
    }

    fn rect() -> Rect {
        Rect { x: 0.0, y: 0.0, width: 1000.0, height: 100.0 }
    }

    #[test]
    fn empty_band_yields_nothing() {
        let mut bands = BTreeMap::new();
        bands.insert(3u8, Vec::new());
        assert!(layout(&bands, rect(), &LayoutConfig::default()).is_empty());
        assert!(layout(&BTreeMap::new(), rect(), &LayoutConfig::default()).is_empty());
    }

    #[test]
    fn single_item_sits_in_the_centre() {
        let mut bands = BTreeMap::new();
        bands.insert(2u8, row(1));
        let placed = layout(&bands, rect(), &LayoutConfig::default());
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].x, 500.0);
        assert_eq!(placed[0].band, 2);
    }

    #[test]
    fn sparse_rows_use_max_spacing_and_stay_centred() {
        let cfg = LayoutConfig::default();
        let mut bands = BTreeMap::new();
        bands.insert(5u8, row(3));
        let placed = layout(&bands, rect(), &cfg);

        let xs: Vec<f64> = placed.iter().map(|p| p.x).collect();
        assert!((xs[1] - xs[0] - cfg.max_spacing).abs() < 1e-9);
        let left_gap = xs[0] - rect().x;
        let right_gap = rect().width - xs[2];
        assert!((left_gap - right_gap).abs() < 1e-9);
    }

    #[test]
    fn crowded_rows_shrink_spacing_to_fit() {
        let cfg = LayoutConfig::default();
        let mut bands = BTreeMap::new();
        bands.insert(1u8, row(200));
        let placed = layout(&bands, rect(), &cfg);

        let spacing = placed[1].x - placed[0].x;
        assert!((spacing - (1000.0 - cfg.margin) / 200.0).abs() < 1e-9);
        for item in &placed {
            assert!(item.x >= 0.0 && item.x <= 1000.0, "x out of band: {}", item.x);
            assert!(item.y >= 0.0 && item.y <= 100.0, "y out of band: {}", item.y);
        }
    }

    #[test]
    fn rows_interleave_vertically() {
        let mut bands = BTreeMap::new();
        bands.insert(4u8, row(6));
        let placed = layout(&bands, rect(), &LayoutConfig::default());
        let above = placed.iter().filter(|p| p.y < 50.0).count();
        let below = placed.iter().filter(|p| p.y > 50.0).count();
        assert!(above > 0 && below > 0);
    }

    #[test]
    fn smaller_rank_gets_larger_size() {
        let mut bands = BTreeMap::new();
        bands.insert(3u8, vec![asset("BIG", Some(1)), asset("SMALL", None)]);
        let placed = layout(&bands, rect(), &LayoutConfig::default());
        assert!(placed[0].size > placed[1].size);
    }

    #[test]
    fn identical_inputs_give_identical_coordinates() {
        let mut bands = BTreeMap::new();
        bands.insert(1u8, row(17));
        bands.insert(4u8, row(5));
        let cfg = LayoutConfig::default();
        let first = layout(&bands, rect(), &cfg);
        let second = layout(&bands, rect(), &cfg);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.x.to_bits(), b.x.to_bits());
            assert_eq!(a.y.to_bits(), b.y.to_bits());
        }
    }

    #[test]
    fn out_of_range_band_keys_are_ignored() {
        let mut bands = BTreeMap::new();
        bands.insert(0u8, row(2));
        bands.insert(9u8, row(2));
        assert!(layout(&bands, rect(), &LayoutConfig::default()).is_empty());
    }
}
