use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Rect;

/// Band layout constants, optionally overridden from a TOML file.
///
/// Example `config/layout.toml`:
/// ```toml
/// band_width = 1400.0
/// band_height = 110.0
/// max_spacing = 80.0
///
/// [[size_steps]]
/// max_rank = 10
/// size = 64.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width of every band rectangle.
    pub band_width: f64,
    /// Height of every band rectangle.
    pub band_height: f64,
    /// Horizontal space kept free, split between both ends of a row.
    pub margin: f64,
    /// Upper bound on the distance between neighbouring centres.
    pub max_spacing: f64,
    /// Vertical wobble as a fraction of half the band height, in [0, 1].
    pub jitter: f64,
    /// Rank thresholds, ascending by `max_rank`. First match wins.
    pub size_steps: Vec<SizeStep>,
    /// Size for ranks beyond the last step (including unranked assets).
    pub min_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SizeStep {
    pub max_rank: u32,
    pub size: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            band_width: 1200.0,
            band_height: 120.0,
            margin: 80.0,
            max_spacing: 90.0,
            jitter: 0.35,
            size_steps: vec![
                SizeStep { max_rank: 10, size: 64.0 },
                SizeStep { max_rank: 25, size: 52.0 },
                SizeStep { max_rank: 50, size: 44.0 },
                SizeStep { max_rank: 100, size: 36.0 },
                SizeStep { max_rank: 200, size: 30.0 },
            ],
            min_size: 24.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum LayoutConfigError {
    #[error("failed to read layout config at '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse layout config at '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid layout config: {0}")]
    Invalid(String),
}

impl LayoutConfig {
    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn load(path: &str) -> Result<Self, LayoutConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| LayoutConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let cfg: LayoutConfig = toml::from_str(&content).map_err(|source| {
            LayoutConfigError::Parse {
                path: path.to_string(),
                source,
            }
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), LayoutConfigError> {
        let positive = [
            ("band_width", self.band_width),
            ("band_height", self.band_height),
            ("max_spacing", self.max_spacing),
            ("min_size", self.min_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(LayoutConfigError::Invalid(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if !(self.margin.is_finite() && self.margin >= 0.0) {
            return Err(LayoutConfigError::Invalid(format!(
                "margin must be non-negative, got {}",
                self.margin
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(LayoutConfigError::Invalid(format!(
                "jitter must be within [0, 1], got {}",
                self.jitter
            )));
        }
        if self
            .size_steps
            .windows(2)
            .any(|w| w[0].max_rank >= w[1].max_rank)
        {
            return Err(LayoutConfigError::Invalid(
                "size_steps must be strictly ascending by max_rank".into(),
            ));
        }
        Ok(())
    }

    /// Visual size for a market-cap rank: smaller rank, bigger bubble.
    pub fn size_for_rank(&self, rank: u32) -> f64 {
        self.size_steps
            .iter()
            .find(|step| rank <= step.max_rank)
            .map(|step| step.size)
            .unwrap_or(self.min_size)
    }

    /// Rectangle shared by every band, anchored at the origin.
    pub fn band_rect(&self) -> Rect {
        Rect {
            x: 0.0,
            y: 0.0,
            width: self.band_width,
            height: self.band_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_steps_shrink_with_rank() {
        let cfg = LayoutConfig::default();
        assert_eq!(cfg.size_for_rank(1), 64.0);
        assert_eq!(cfg.size_for_rank(10), 64.0);
        assert_eq!(cfg.size_for_rank(11), 52.0);
        assert_eq!(cfg.size_for_rank(150), 30.0);
        assert_eq!(cfg.size_for_rank(common::MISSING_RANK), cfg.min_size);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: LayoutConfig = toml::from_str("band_width = 900.0\njitter = 0.1\n").unwrap();
        assert_eq!(cfg.band_width, 900.0);
        assert_eq!(cfg.jitter, 0.1);
        assert_eq!(cfg.band_height, LayoutConfig::default().band_height);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unordered_steps_and_bad_jitter() {
        let mut cfg = LayoutConfig::default();
        cfg.size_steps.swap(0, 1);
        assert!(cfg.validate().is_err());

        let cfg = LayoutConfig {
            jitter: 1.5,
            ..LayoutConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = LayoutConfig::load("/nonexistent/layout.toml").unwrap_err();
        assert!(matches!(err, LayoutConfigError::Read { .. }));
    }
}
