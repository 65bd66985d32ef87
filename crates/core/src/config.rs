//! Configuration structures for the market-trends system.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ordered::OrderedMap;

/// Main configuration for a compaction/analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Snapshot reader configuration.
    pub reader: ReaderConfig,
    /// Change-log compaction configuration.
    pub compaction: CompactionConfig,
    /// Trend analysis configuration.
    pub trend: TrendConfig,
    /// Ranking configuration.
    pub rank: RankConfig,
}

impl Config {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.reader.extension.is_empty() {
            return Err(Error::config("reader.extension must not be empty"));
        }
        if self.compaction.retention_days == 0 {
            return Err(Error::config("compaction.retention_days must be positive"));
        }
        if self.trend.windows_days.is_empty() {
            return Err(Error::config("trend.windows_days must list at least one window"));
        }
        if self.trend.windows_days.contains(&0) {
            return Err(Error::config("trend.windows_days entries must be positive"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.trend.windows_days.iter().find(|d| !seen.insert(**d)) {
            return Err(Error::config(format!("trend.windows_days lists {dup} more than once")));
        }
        if self.trend.min_points == 0 || self.trend.simple_min_points == 0 {
            return Err(Error::config("trend minimum point counts must be positive"));
        }
        let (lo, hi) = (self.trend.winsor_lower, self.trend.winsor_upper);
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(Error::config(format!(
                "winsorization bounds must satisfy 0 <= lower <= upper <= 1 (got {lo}, {hi})"
            )));
        }
        if self.trend.min_abs_change < 0.0 {
            return Err(Error::config("trend.min_abs_change must not be negative"));
        }
        if self.rank.top_n == 0 {
            return Err(Error::config("rank.top_n must be positive"));
        }
        Ok(())
    }
}

/// Where a snapshot's capture time comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Integer epoch seconds in the file stem, e.g. `1700000000.json`.
    #[default]
    FileName,
    /// A top-level `timestamp` field inside the document.
    Embedded,
}

/// Snapshot reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// How to obtain the capture timestamp.
    pub timestamp_source: TimestampSource,
    /// File extension of snapshot documents (without the dot).
    pub extension: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            timestamp_source: TimestampSource::FileName,
            extension: "json".to_string(),
        }
    }
}

/// Change-log compaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Snapshots older than this many days before the reference instant are
    /// dropped before compaction.
    pub retention_days: u32,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

/// Which trend classifier to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendAlgorithm {
    /// Winsorized regression plus volatility.
    #[default]
    Generalized,
    /// Bid-only count-of-increases classifier.
    Simple,
}

/// Trend analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Classifier variant.
    pub algorithm: TrendAlgorithm,
    /// Analysis windows in days; one trend list per window.
    pub windows_days: Vec<u32>,
    /// Minimum valid points for the generalized analyzer.
    pub min_points: usize,
    /// Minimum valid points for the simple analyzer.
    pub simple_min_points: usize,
    /// Results with a smaller absolute change are dropped.
    pub min_abs_change: f64,
    /// Lower winsorization percentile (fraction).
    pub winsor_lower: f64,
    /// Upper winsorization percentile (fraction).
    pub winsor_upper: f64,
    /// |percent| below this (with weak fit) is Flat.
    pub flat_percent: f64,
    /// r² below this (with small move) is Flat.
    pub flat_r2: f64,
    /// r² at or above this is a directional trend.
    pub trend_r2: f64,
    /// |percent| at or above this makes a trend Strong.
    pub strong_percent: f64,
    /// Coefficient of variation above this can be Volatile.
    pub volatile_cv: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            algorithm: TrendAlgorithm::Generalized,
            windows_days: vec![3, 7, 30],
            min_points: 5,
            simple_min_points: 3,
            min_abs_change: 50.0,
            winsor_lower: 0.05,
            winsor_upper: 0.95,
            flat_percent: 5.0,
            flat_r2: 0.2,
            trend_r2: 0.7,
            strong_percent: 20.0,
            volatile_cv: 0.2,
        }
    }
}

/// Ranking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    /// Results kept per window.
    pub top_n: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self { top_n: 15 }
    }
}

/// Item allow-list grouped by category.
///
/// Category and item order are kept as written so the list can be echoed
/// back into the output artifact unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList {
    categories: OrderedMap<Vec<String>>,
}

impl AllowList {
    /// Build from `(category, items)` pairs.
    pub fn new<C, I, S>(categories: C) -> Self
    where
        C: IntoIterator<Item = (S, I)>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories
                .into_iter()
                .map(|(name, items)| (name, items.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Parse from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file. Any failure here is fatal for the run.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read allow-list {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::config(format!("invalid allow-list {}: {e}", path.display())))
    }

    /// Categories in document order.
    pub fn categories(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Union of all category lists.
    pub fn item_set(&self) -> HashSet<String> {
        self.categories.values().flatten().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.compaction.retention_days, 30);
        assert_eq!(config.trend.windows_days, vec![3, 7, 30]);
        assert_eq!(config.trend.min_points, 5);
        assert_eq!(config.trend.min_abs_change, 50.0);
        assert_eq!(config.rank.top_n, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"trend":{"algorithm":"simple","windows_days":[5]}}"#).unwrap();
        assert_eq!(config.trend.algorithm, TrendAlgorithm::Simple);
        assert_eq!(config.trend.windows_days, vec![5]);
        assert_eq!(config.trend.min_points, 5);
        assert_eq!(config.reader.timestamp_source, TimestampSource::FileName);
    }

    #[test]
    fn test_validate_rejects_bad_winsor_bounds() {
        let mut config = Config::default();
        config.trend.winsor_lower = 0.9;
        config.trend.winsor_upper = 0.1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = Config::default();
        config.trend.windows_days = vec![7, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_window() {
        let mut config = Config::default();
        config.trend.windows_days = vec![7, 30, 7];
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.trend.windows_days = vec![30, 7];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_allow_list_order_and_union() {
        let list = AllowList::from_json_str(
            r#"{"Tools":["/items/hammer","/items/saw"],"Food":["/items/apple","/items/saw"]}"#,
        )
        .unwrap();
        let names: Vec<&str> = list.categories().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Tools", "Food"]);

        let set = list.item_set();
        assert_eq!(set.len(), 3);
        assert!(set.contains("/items/apple"));

        let echoed = serde_json::to_string(&list).unwrap();
        assert!(echoed.starts_with(r#"{"Tools":"#));
    }

    #[test]
    fn test_allow_list_missing_file_is_config_error() {
        let err = AllowList::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
