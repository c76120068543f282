use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use common::{AssetSignal, BandFilter, Direction, SortField, SortOrder, SortSpec, MAX_LAYER};

use crate::{ClassifiedAsset, ClassifiedSnapshot};

/// Which consumer the view is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Tabular view: every asset that passes the band filter.
    #[default]
    Flat,
    /// Grouped strength bands: only assets with a signal in the direction.
    Banded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ViewQuery {
    pub direction: Direction,
    pub band_filter: BandFilter,
    pub sort: SortSpec,
    pub mode: ViewMode,
}

/// Filter and order a classified snapshot.
///
/// Steps run in a fixed order: RSI-band filter, then (banded mode only) the
/// direction filter keeping layer > 0, then a stable sort. Both filters
/// compose with AND. Ties keep snapshot order.
pub fn view(snapshot: &ClassifiedSnapshot, query: &ViewQuery) -> Vec<ClassifiedAsset> {
    let mut items: Vec<ClassifiedAsset> = snapshot
        .assets
        .iter()
        .filter(|entry| query.band_filter.admits(entry.band))
        .filter(|entry| match query.mode {
            ViewMode::Flat => true,
            ViewMode::Banded => entry.layer(query.direction) > 0,
        })
        .cloned()
        .collect();

    // `sort_by` is stable
    items.sort_by(|a, b| compare(&a.asset, &b.asset, query.sort));
    items
}

fn compare(a: &AssetSignal, b: &AssetSignal, sort: SortSpec) -> Ordering {
    let value = |asset: &AssetSignal| match sort.field {
        SortField::Rank => asset.rank() as f64,
        SortField::Price => asset.price,
        SortField::Change24h => asset.price_change_24h,
        SortField::Rsi => asset.rsi,
        SortField::RsiSmoothed => asset.rsi_smoothed,
    };
    compare_values(value(a), value(b), sort.order)
}

/// NaN sorts last in either direction.
fn compare_values(a: f64, b: f64, order: SortOrder) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        // Neither is NaN, so `partial_cmp` is total here and -0.0 ties 0.0.
        (false, false) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        }
    }
}

/// Split an ordered view into strength bands 1..=5 for `direction`,
/// preserving order inside each band. Layer 0 never forms a band.
pub fn group_by_layer(
    items: &[ClassifiedAsset],
    direction: Direction,
) -> BTreeMap<u8, Vec<AssetSignal>> {
    let mut bands: BTreeMap<u8, Vec<AssetSignal>> = BTreeMap::new();
    for entry in items {
        let layer = entry.layer(direction);
        if (1..=MAX_LAYER).contains(&layer) {
            bands.entry(layer).or_default().push(entry.asset.clone());
        }
    }
    bands
}
