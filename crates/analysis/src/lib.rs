//! Compaction and trend analysis for the market-trends system.
//!
//! This crate handles:
//! - Change-log compaction of snapshot streams
//! - Per-item price series reconstruction
//! - Winsorized regression and volatility statistics
//! - Trend classification and ranking
//! - Assembly of the published dataset

pub mod compactor;
pub mod dataset;
pub mod engine;
pub mod ranker;
pub mod regression;
pub mod series;
pub mod trend;

pub use compactor::{replay, CompactionStats, DeltaCompactor};
pub use dataset::{CompactDataset, WindowTrends};
pub use engine::ReportEngine;
pub use ranker::{RankOrder, Ranker};
pub use series::{ItemSeries, PriceSource, SeriesBuilder};
pub use trend::{SimpleTrendAnalyzer, TrendAnalyzer, TrendThresholds};
