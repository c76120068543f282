use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// Rank assumed for assets the upstream service did not rank.
/// Sorts last in ascending rank order and gets the smallest bubble.
pub const MISSING_RANK: u32 = 9999;

/// Highest valid signal layer. Layer 0 means "no signal in that direction".
pub const MAX_LAYER: u8 = 5;

/// Which trading bias is being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            other => Err(Error::InvalidParameter(format!(
                "direction must be 'long' or 'short', got '{other}'"
            ))),
        }
    }
}

/// Candle timeframe the upstream service computes indicators on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[default]
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::W1,
    ];

    /// Query-string value understood by the signal service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == wanted)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "timeframe must be one of 15m, 1h, 4h, 12h, 1d, 1w, got '{wanted}'"
                ))
            })
    }
}

/// Parameters of a single snapshot fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub timeframe: Timeframe,
    /// Number of assets requested. Values above what the service has are
    /// answered with everything available.
    pub limit: u32,
}

impl FetchRequest {
    pub fn new(timeframe: Timeframe, limit: u32) -> Self {
        Self { timeframe, limit }
    }
}

/// One asset's indicator values in a snapshot, exactly as the upstream
/// service reported them. Out-of-domain values are kept verbatim here and
/// flagged during classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSignal {
    pub symbol: String,
    #[serde(rename = "full_name", alias = "name", default)]
    pub name: String,
    #[serde(deserialize_with = "nullable_f64")]
    pub price: f64,
    #[serde(default, deserialize_with = "nullable_f64")]
    pub price_change_24h: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub rsi: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub rsi_smoothed: f64,
    #[serde(default, deserialize_with = "nullable_f64")]
    pub ema_13: f64,
    #[serde(default, deserialize_with = "nullable_f64")]
    pub ema_21: f64,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub long_layer: i32,
    #[serde(default)]
    pub short_layer: i32,
}

impl AssetSignal {
    /// Market-cap rank with [`MISSING_RANK`] standing in for unranked assets.
    pub fn rank(&self) -> u32 {
        match self.market_cap_rank {
            Some(rank) if rank > 0 => rank,
            _ => MISSING_RANK,
        }
    }

    /// Raw layer value for `direction`.
    pub fn raw_layer(&self, direction: Direction) -> i32 {
        match direction {
            Direction::Long => self.long_layer,
            Direction::Short => self.short_layer,
        }
    }
}

/// The service serialises NaN indicators as `null`.
fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// One complete, successful fetch result. Never patched: a new snapshot
/// replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timeframe: Timeframe,
    pub limit: u32,
    pub fetched_at: DateTime<Utc>,
    /// Asset count reported by the service (may exceed `assets.len()` when
    /// the response was truncated upstream).
    pub total_assets: usize,
    pub assets: Vec<AssetSignal>,
}

impl Snapshot {
    pub fn new(request: FetchRequest, fetched_at: DateTime<Utc>, assets: Vec<AssetSignal>) -> Self {
        Self {
            timeframe: request.timeframe,
            limit: request.limit,
            fetched_at,
            total_assets: assets.len(),
            assets,
        }
    }

    pub fn request(&self) -> FetchRequest {
        FetchRequest::new(self.timeframe, self.limit)
    }
}

/// RSI range category, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    Oversold,
    Weak,
    Neutral,
    Strong,
    Overbought,
}

impl Band {
    pub const ALL: [Band; 5] = [
        Band::Oversold,
        Band::Weak,
        Band::Neutral,
        Band::Strong,
        Band::Overbought,
    ];
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Band::Oversold => "OVERSOLD",
            Band::Weak => "WEAK",
            Band::Neutral => "NEUTRAL",
            Band::Strong => "STRONG",
            Band::Overbought => "OVERBOUGHT",
        };
        f.write_str(label)
    }
}

impl FromStr for Band {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Band::ALL
            .into_iter()
            .find(|band| band.to_string() == wanted)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown RSI band '{wanted}'")))
    }
}

/// RSI-band filter applied before any other view step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", tag = "kind", content = "band")]
pub enum BandFilter {
    #[default]
    All,
    Only(Band),
}

impl BandFilter {
    pub fn admits(&self, band: Band) -> bool {
        match self {
            BandFilter::All => true,
            BandFilter::Only(wanted) => *wanted == band,
        }
    }
}

impl FromStr for BandFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(BandFilter::All);
        }
        s.parse().map(BandFilter::Only)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Rank,
    Price,
    #[serde(rename = "change_24h")]
    Change24h,
    Rsi,
    RsiSmoothed,
}

impl SortField {
    /// Order picked when the field is newly selected: best rank first,
    /// largest value first for everything else.
    pub fn default_order(&self) -> SortOrder {
        match self {
            SortField::Rank => SortOrder::Ascending,
            _ => SortOrder::Descending,
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rank" => Ok(SortField::Rank),
            "price" => Ok(SortField::Price),
            "change_24h" | "change" => Ok(SortField::Change24h),
            "rsi" => Ok(SortField::Rsi),
            "rsi_smoothed" => Ok(SortField::RsiSmoothed),
            other => Err(Error::InvalidParameter(format!("unknown sort field '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

/// Fetch lifecycle as shown to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", tag = "state", content = "label")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Ok,
    /// Recoverable upstream condition; existing data stays on screen.
    Warning(String),
    /// Any other failure; existing data is stale until the next success.
    Error(String),
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Idle => write!(f, "idle"),
            FetchStatus::Loading => write!(f, "loading"),
            FetchStatus::Ok => write!(f, "ok"),
            FetchStatus::Warning(label) => write!(f, "warning: {label}"),
            FetchStatus::Error(label) => write!(f, "error: {label}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_signal_decodes_service_record() {
        let json = r#"{
            "symbol": "BTC", "full_name": "Bitcoin", "price": 64000.5,
            "price_change_24h": -2.1, "rsi": 28.4, "rsi_smoothed": 31.0,
            "ema_13": 64100.0, "ema_21": 64500.0, "market_cap_rank": 1,
            "long_layer": 2, "short_layer": 0
        }"#;
        let asset: AssetSignal = serde_json::from_str(json).unwrap();
        assert_eq!(asset.name, "Bitcoin");
        assert_eq!(asset.rank(), 1);
        assert_eq!(asset.raw_layer(Direction::Long), 2);
        assert_eq!(asset.raw_layer(Direction::Short), 0);
    }

    #[test]
    fn null_indicators_decode_as_nan_and_missing_rank_uses_sentinel() {
        let json = r#"{"symbol": "NEW", "price": 1.0, "rsi": null, "rsi_smoothed": null}"#;
        let asset: AssetSignal = serde_json::from_str(json).unwrap();
        assert!(asset.rsi.is_nan());
        assert!(asset.rsi_smoothed.is_nan());
        assert_eq!(asset.rank(), MISSING_RANK);
        assert_eq!(asset.long_layer, 0);
    }

    #[test]
    fn timeframe_round_trips_through_query_string() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("2h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn band_filter_parses_all_and_single_bands() {
        assert_eq!("all".parse::<BandFilter>().unwrap(), BandFilter::All);
        assert_eq!(
            "oversold".parse::<BandFilter>().unwrap(),
            BandFilter::Only(Band::Oversold)
        );
        assert!(BandFilter::Only(Band::Weak).admits(Band::Weak));
        assert!(!BandFilter::Only(Band::Weak).admits(Band::Strong));
    }

    #[test]
    fn sort_field_defaults() {
        assert_eq!(SortField::Rank.default_order(), SortOrder::Ascending);
        assert_eq!(SortField::Rsi.default_order(), SortOrder::Descending);
        assert_eq!(SortOrder::Ascending.toggled(), SortOrder::Descending);
    }
}
