//! Report engine.
//!
//! Runs one batch: load snapshots, compact the change-log, analyze every
//! configured window, and assemble the [`CompactDataset`].

use std::path::Path;

use market_core::config::TrendAlgorithm;
use market_core::{AllowList, Config, Result, Snapshot, TimestampSecs, TrendResult};
use market_ingestion::{ItemFilter, SnapshotReader, TimeWindow};
use tracing::info;

use crate::{
    compactor::DeltaCompactor,
    dataset::{CompactDataset, WindowTrends},
    ranker::{RankOrder, Ranker},
    series::{PriceSource, SeriesBuilder},
    trend::{SimpleTrendAnalyzer, TrendAnalyzer},
};

/// Batch compaction and trend analysis.
pub struct ReportEngine {
    config: Config,
}

impl ReportEngine {
    /// Create an engine. Fails if the configuration is inconsistent.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Days of history the full report needs.
    fn horizon_days(&self) -> u32 {
        let longest_window = self.config.trend.windows_days.iter().copied().max().unwrap_or(0);
        longest_window.max(self.config.compaction.retention_days)
    }

    /// Produce the dataset from a snapshot directory.
    ///
    /// `reference` stands in for "now": retention and every analysis window
    /// end there.
    pub fn run(
        &self,
        snapshot_dir: &Path,
        allow_list: AllowList,
        reference: TimestampSecs,
    ) -> Result<CompactDataset> {
        let mut reader = SnapshotReader::new(snapshot_dir, &self.config.reader);
        let snapshots = reader.load(TimeWindow::ending_at(reference, self.horizon_days()))?;
        Ok(self.build(&snapshots, allow_list, reference))
    }

    /// Produce the dataset from snapshots already in memory, sorted by
    /// timestamp.
    pub fn build(
        &self,
        snapshots: &[Snapshot],
        allow_list: AllowList,
        reference: TimestampSecs,
    ) -> CompactDataset {
        let retention = TimeWindow::ending_at(reference, self.config.compaction.retention_days);

        let mut compactor = DeltaCompactor::new(ItemFilter::from_allow_list(&allow_list));
        compactor.push_snapshots(snapshots.iter().filter(|s| retention.contains(s.ts)));

        let stats = compactor.stats().clone();
        let (items, rows) = compactor.finish();
        info!(
            snapshots = stats.snapshots,
            items = items.len(),
            rows = rows.len(),
            unchanged = stats.unchanged,
            no_trade = stats.no_trade,
            "compacted change-log"
        );

        // Trends cover the items that made it into the change-log.
        let tracked = ItemFilter::from_items(items.iter().cloned());
        let trends = self
            .config
            .trend
            .windows_days
            .iter()
            .map(|&days| WindowTrends {
                days,
                results: self.analyze_window(snapshots, days, &tracked, reference),
            })
            .collect();

        CompactDataset {
            items,
            rows,
            config: allow_list,
            trends,
        }
    }

    /// Standalone trend report over `days` ending at `reference`.
    pub fn analyze(
        &self,
        snapshot_dir: &Path,
        days: u32,
        filter: &ItemFilter,
        reference: TimestampSecs,
    ) -> Result<Vec<TrendResult>> {
        let mut reader = SnapshotReader::new(snapshot_dir, &self.config.reader);
        let snapshots = reader.load(TimeWindow::ending_at(reference, days))?;
        Ok(self.analyze_window(&snapshots, days, filter, reference))
    }

    /// Ranked trend results for one window.
    pub fn analyze_window(
        &self,
        snapshots: &[Snapshot],
        days: u32,
        filter: &ItemFilter,
        reference: TimestampSecs,
    ) -> Vec<TrendResult> {
        let trend = &self.config.trend;
        let window = TimeWindow::ending_at(reference, days);

        let (source, order) = match trend.algorithm {
            TrendAlgorithm::Generalized => (PriceSource::MidOrSide, RankOrder::AbsPercent),
            TrendAlgorithm::Simple => (PriceSource::Bid, RankOrder::SignedPercent),
        };
        let series = SeriesBuilder::new(filter.clone(), source).build(snapshots, window);

        let results: Vec<TrendResult> = match trend.algorithm {
            TrendAlgorithm::Generalized => {
                let analyzer = TrendAnalyzer::new(trend);
                series
                    .iter()
                    .filter_map(|s| analyzer.analyze(&s.item, &s.points))
                    .collect()
            }
            TrendAlgorithm::Simple => {
                let analyzer = SimpleTrendAnalyzer::new(trend);
                series
                    .iter()
                    .filter_map(|s| analyzer.analyze(&s.item, &s.points))
                    .collect()
            }
        };

        let qualified = results.len();
        let ranked = Ranker::new(self.config.rank.top_n, order).rank(results);
        info!(
            days,
            series = series.len(),
            qualified,
            kept = ranked.len(),
            "analyzed window"
        );
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use market_core::{ItemQuotes, Quote, TrendLabel, SECONDS_PER_DAY};

    const DAY: i64 = SECONDS_PER_DAY;
    const NOW: i64 = 1_700_000_000;

    fn relaxed_config() -> Config {
        let mut config = Config::default();
        config.trend.min_points = 3;
        config.trend.min_abs_change = 0.0;
        config
    }

    fn make_snapshot(ts: i64, quotes: &[(&str, i64, i64)]) -> Snapshot {
        Snapshot {
            ts,
            items: quotes
                .iter()
                .map(|&(item, ask, bid)| ItemQuotes {
                    item: item.to_string(),
                    tiers: vec![(0, Quote::from_raw(ask, bid))],
                })
                .collect(),
        }
    }

    fn allow(items: &[&str]) -> AllowList {
        AllowList::new([("All", items.to_vec())])
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let mut config = Config::default();
        config.rank.top_n = 0;
        assert!(ReportEngine::new(config).is_err());
    }

    #[test]
    fn test_end_to_end_scenario() {
        let snapshots = vec![
            make_snapshot(NOW - 2 * DAY, &[("X", 100, 98)]),
            make_snapshot(NOW - DAY, &[("X", 120, 118)]),
            make_snapshot(NOW, &[("X", 150, 148)]),
        ];
        let engine = ReportEngine::new(relaxed_config()).unwrap();
        let dataset = engine.build(&snapshots, allow(&["X"]), NOW);

        assert_eq!(dataset.items, vec!["X"]);
        assert_eq!(dataset.rows.len(), 3);

        let week = dataset.trends_for(7).unwrap();
        assert_eq!(week.len(), 1);
        let x = &week[0];
        assert_eq!((x.first, x.last), (99.0, 149.0));
        assert_relative_eq!(x.percent, 50.505050505, epsilon = 1e-6);
        assert_eq!((x.ups, x.downs), (2, 0));
        assert_eq!(x.trend_label, TrendLabel::StrongUptrend);
    }

    #[test]
    fn test_windows_and_retention() {
        let mut snapshots = vec![make_snapshot(NOW - 40 * DAY, &[("old", 500, 400)])];
        // Ten daily points for "a": flat for the first five, rising after.
        for d in (0..10).rev() {
            let price = if d >= 5 { 1000 } else { 1000 + (5 - d) * 200 };
            snapshots.push(make_snapshot(NOW - d * DAY, &[("a", price, price), ("skip", 1, 1)]));
        }
        let engine = ReportEngine::new(relaxed_config()).unwrap();
        let dataset = engine.build(&snapshots, allow(&["a", "old"]), NOW);

        // "old" only appears before the 30-day retention cutoff.
        assert_eq!(dataset.items, vec!["a"]);
        assert!(dataset.rows.iter().all(|r| r.ts >= NOW - 30 * DAY));

        let keys: Vec<String> = dataset.trends.iter().map(WindowTrends::key).collect();
        assert_eq!(keys, vec!["trends_3d", "trends_7d", "trends_30d"]);

        let three = &dataset.trends_for(3).unwrap()[0];
        assert_eq!(three.first, 1400.0);
        assert_eq!(three.last, 2000.0);
        let thirty = &dataset.trends_for(30).unwrap()[0];
        assert_eq!(thirty.first, 1000.0);
    }

    #[test]
    fn test_simple_algorithm_uses_bid_and_signed_order() {
        let mut config = relaxed_config();
        config.trend.algorithm = TrendAlgorithm::Simple;
        let engine = ReportEngine::new(config).unwrap();

        let snapshots = vec![
            make_snapshot(NOW - 3 * DAY, &[("up", 1000, 100), ("down", 1000, 400)]),
            make_snapshot(NOW - 2 * DAY, &[("up", 1000, 110), ("down", 1000, 300)]),
            make_snapshot(NOW - DAY, &[("up", 1000, 120), ("down", 1000, 200)]),
        ];
        let results = engine.analyze_window(&snapshots, 5, &ItemFilter::allow_all(), NOW);

        let items: Vec<&str> = results.iter().map(|r| r.item.as_str()).collect();
        assert_eq!(items, vec!["up", "down"]);
        assert_eq!(results[0].first, 100.0);
        assert_relative_eq!(results[1].percent, -50.0);
    }

    #[test]
    fn test_run_reads_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        for (i, bid) in [100, 200, 300].iter().enumerate() {
            let ts = NOW - (2 - i as i64) * DAY;
            let body = format!(
                r#"{{"marketData":{{"/items/x":{{"0":{{"a":{},"b":{}}}}},"/items/y":{{"0":{{"a":-1,"b":-1}}}}}}}}"#,
                bid + 2,
                bid
            );
            std::fs::write(temp_dir.path().join(format!("{ts}.json")), body).unwrap();
        }
        std::fs::write(temp_dir.path().join("notes.json"), "{}").unwrap();

        let engine = ReportEngine::new(relaxed_config()).unwrap();
        let dataset = engine
            .run(temp_dir.path(), allow(&["/items/x", "/items/y"]), NOW)
            .unwrap();

        assert_eq!(dataset.items, vec!["/items/x", "/items/y"]);
        assert_eq!(dataset.rows.len(), 3);
        assert_eq!(dataset.trends_for(3).unwrap().len(), 1);
    }

    #[test]
    fn test_run_missing_directory_fails() {
        let engine = ReportEngine::new(Config::default()).unwrap();
        let result = engine.run(Path::new("/no/such/dir"), AllowList::default(), NOW);
        assert!(result.is_err());
    }
}
