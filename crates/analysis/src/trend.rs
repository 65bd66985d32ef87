//! Trend classification.
//!
//! Two analyzers share the [`TrendResult`] output:
//! - [`TrendAnalyzer`]: winsorized regression, volatility and direction
//!   counts. This is the default.
//! - [`SimpleTrendAnalyzer`]: bid-only count-of-increases classifier kept
//!   for reports that still expect its labels.

use market_core::config::TrendConfig;
use market_core::{PricePoint, TrendLabel, TrendResult, SECONDS_PER_DAY};
use ordered_float::OrderedFloat;

use crate::regression::{coefficient_of_variation, count_moves, linear_fit, winsorize};

/// Classification thresholds for the regression analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendThresholds {
    pub flat_percent: f64,
    pub flat_r2: f64,
    pub trend_r2: f64,
    pub strong_percent: f64,
    pub volatile_cv: f64,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self::from(&TrendConfig::default())
    }
}

impl From<&TrendConfig> for TrendThresholds {
    fn from(config: &TrendConfig) -> Self {
        Self {
            flat_percent: config.flat_percent,
            flat_r2: config.flat_r2,
            trend_r2: config.trend_r2,
            strong_percent: config.strong_percent,
            volatile_cv: config.volatile_cv,
        }
    }
}

/// Statistics the label is decided from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendStats {
    pub percent: f64,
    pub slope: f64,
    pub r2: f64,
    pub cv: f64,
    pub ups: u32,
    pub downs: u32,
}

impl TrendThresholds {
    /// Pick a label. First matching rule wins.
    pub fn classify(&self, s: &TrendStats) -> TrendLabel {
        if s.percent.abs() < self.flat_percent && s.r2 < self.flat_r2 {
            return TrendLabel::Flat;
        }
        if s.r2 >= self.trend_r2 && s.slope > 0.0 {
            return if s.percent >= self.strong_percent {
                TrendLabel::StrongUptrend
            } else {
                TrendLabel::Uptrend
            };
        }
        if s.r2 >= self.trend_r2 && s.slope < 0.0 {
            return if s.percent <= -self.strong_percent {
                TrendLabel::StrongDowntrend
            } else {
                TrendLabel::Downtrend
            };
        }
        if s.cv > self.volatile_cv && s.ups > 0 && s.downs > 0 {
            return TrendLabel::Volatile;
        }
        TrendLabel::Uncertain
    }
}

/// Valid points sorted by time.
fn clean_points(points: &[PricePoint]) -> Vec<(i64, f64)> {
    let mut clean: Vec<(i64, f64)> = points
        .iter()
        .filter_map(|p| p.price.map(|price| (p.ts, price)))
        .collect();
    clean.sort_by_key(|&(ts, price)| (ts, OrderedFloat(price)));
    clean
}

#[inline]
fn percent_change(first: f64, last: f64) -> f64 {
    if first != 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    }
}

/// Regression-based trend analyzer.
#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    min_points: usize,
    min_abs_change: f64,
    winsor_lower: f64,
    winsor_upper: f64,
    thresholds: TrendThresholds,
}

impl TrendAnalyzer {
    /// Create an analyzer from configuration.
    pub fn new(config: &TrendConfig) -> Self {
        Self {
            min_points: config.min_points,
            min_abs_change: config.min_abs_change,
            winsor_lower: config.winsor_lower,
            winsor_upper: config.winsor_upper,
            thresholds: TrendThresholds::from(config),
        }
    }

    /// Override the minimum number of valid points.
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Override the minimum absolute change.
    pub fn with_min_abs_change(mut self, min_abs_change: f64) -> Self {
        self.min_abs_change = min_abs_change;
        self
    }

    /// Analyze one item's series.
    ///
    /// Returns `None` when there are too few valid points or the absolute
    /// move is below the configured floor.
    pub fn analyze(&self, item: &str, points: &[PricePoint]) -> Option<TrendResult> {
        let clean = clean_points(points);
        if clean.len() < self.min_points || clean.is_empty() {
            return None;
        }

        let t0 = clean[0].0;
        let xs: Vec<f64> = clean
            .iter()
            .map(|&(ts, _)| (ts - t0) as f64 / SECONDS_PER_DAY as f64)
            .collect();
        let ys: Vec<f64> = clean.iter().map(|&(_, p)| p).collect();

        let first = ys[0];
        let last = ys[ys.len() - 1];
        let change = last - first;
        let percent = percent_change(first, last);
        let (ups, downs) = count_moves(&ys);

        let ys_w = winsorize(&ys, self.winsor_lower, self.winsor_upper);
        let fit = linear_fit(&xs, &ys_w);
        let cv = coefficient_of_variation(&ys);

        let trend_label = self.thresholds.classify(&TrendStats {
            percent,
            slope: fit.slope,
            r2: fit.r2,
            cv,
            ups,
            downs,
        });

        // Applied after classification: a clean fit on a tiny move is noise.
        if change.abs() < self.min_abs_change {
            return None;
        }

        Some(TrendResult {
            item: item.to_string(),
            first,
            last,
            change,
            percent,
            ups,
            downs,
            slope_per_day: fit.slope,
            r2: fit.r2,
            volatility_cv: cv,
            trend_label,
        })
    }
}

/// Increases needed for a Strong Trend.
const SIMPLE_STRONG_UPS: u32 = 3;
/// |percent| above which a two-way series is Volatile.
const SIMPLE_VOLATILE_PERCENT: f64 = 20.0;
/// |percent| below which a series is Flat.
const SIMPLE_FLAT_PERCENT: f64 = 5.0;

/// Count-of-increases analyzer over bid prices.
///
/// Reports no regression or volatility figures; those fields are zero.
#[derive(Debug, Clone)]
pub struct SimpleTrendAnalyzer {
    min_points: usize,
}

impl SimpleTrendAnalyzer {
    pub fn new(config: &TrendConfig) -> Self {
        Self {
            min_points: config.simple_min_points,
        }
    }

    pub fn analyze(&self, item: &str, points: &[PricePoint]) -> Option<TrendResult> {
        let ys: Vec<f64> = points.iter().filter_map(|p| p.price).collect();
        if ys.len() < self.min_points || ys.is_empty() {
            return None;
        }

        let first = ys[0];
        let last = ys[ys.len() - 1];
        let percent = percent_change(first, last);
        let (ups, downs) = count_moves(&ys);

        let trend_label = if ups >= SIMPLE_STRONG_UPS {
            TrendLabel::StrongTrend
        } else if percent.abs() > SIMPLE_VOLATILE_PERCENT && ups > 0 && downs > 0 {
            TrendLabel::Volatile
        } else if percent.abs() < SIMPLE_FLAT_PERCENT {
            TrendLabel::Flat
        } else {
            TrendLabel::Uncertain
        };

        Some(TrendResult {
            item: item.to_string(),
            first,
            last,
            change: last - first,
            percent,
            ups,
            downs,
            slope_per_day: 0.0,
            r2: 0.0,
            volatility_cv: 0.0,
            trend_label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DAY: i64 = SECONDS_PER_DAY;

    fn series(prices: &[f64]) -> Vec<PricePoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PricePoint::new(i as i64 * DAY, Some(p)))
            .collect()
    }

    fn stats(percent: f64, slope: f64, r2: f64, cv: f64, ups: u32, downs: u32) -> TrendStats {
        TrendStats {
            percent,
            slope,
            r2,
            cv,
            ups,
            downs,
        }
    }

    #[test]
    fn test_classify_precedence() {
        let t = TrendThresholds::default();
        assert_eq!(t.classify(&stats(4.9, 1.0, 0.1, 0.0, 1, 1)), TrendLabel::Flat);
        assert_eq!(t.classify(&stats(25.0, 3.0, 0.8, 0.0, 4, 0)), TrendLabel::StrongUptrend);
        assert_eq!(t.classify(&stats(10.0, 3.0, 0.8, 0.0, 4, 0)), TrendLabel::Uptrend);
        assert_eq!(t.classify(&stats(-20.0, -3.0, 0.9, 0.0, 0, 4)), TrendLabel::StrongDowntrend);
        assert_eq!(t.classify(&stats(-8.0, -3.0, 0.9, 0.0, 0, 4)), TrendLabel::Downtrend);
        assert_eq!(t.classify(&stats(12.0, 1.0, 0.3, 0.25, 2, 2)), TrendLabel::Volatile);
        assert_eq!(t.classify(&stats(12.0, 1.0, 0.3, 0.25, 2, 0)), TrendLabel::Uncertain);
        // Small move but a decent fit is not Flat.
        assert_eq!(t.classify(&stats(3.0, 1.0, 0.5, 0.0, 3, 0)), TrendLabel::Uncertain);
        // Strong fit with zero slope falls through to the volatility rules.
        assert_eq!(t.classify(&stats(30.0, 0.0, 0.9, 0.0, 1, 1)), TrendLabel::Uncertain);
    }

    #[test]
    fn test_linear_series() {
        // y = 2x + 1 scaled so the absolute change clears the floor.
        let prices: Vec<f64> = (0..10).map(|x| 200.0 * x as f64 + 100.0).collect();
        let analyzer = TrendAnalyzer::new(&TrendConfig::default());
        let result = analyzer.analyze("x", &series(&prices)).unwrap();

        assert_relative_eq!(result.slope_per_day, 200.0, epsilon = 1e-9);
        assert_relative_eq!(result.r2, 1.0, epsilon = 1e-12);
        assert_eq!(result.ups, 9);
        assert_eq!(result.downs, 0);
        assert_eq!(result.trend_label, TrendLabel::StrongUptrend);
    }

    #[test]
    fn test_unit_linear_regression_sanity() {
        let prices: Vec<f64> = (0..6).map(|x| 2.0 * x as f64 + 1.0).collect();
        let analyzer = TrendAnalyzer::new(&TrendConfig::default()).with_min_abs_change(0.0);
        let result = analyzer.analyze("x", &series(&prices)).unwrap();
        assert_relative_eq!(result.slope_per_day, 2.0, epsilon = 1e-9);
        assert_relative_eq!(result.r2, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_too_few_points() {
        let analyzer = TrendAnalyzer::new(&TrendConfig::default());
        let mut points = series(&[100.0, 200.0, 300.0, 400.0]);
        points.push(PricePoint::new(10 * DAY, None));
        assert!(analyzer.analyze("x", &points).is_none());
    }

    #[test]
    fn test_small_absolute_change_rejected() {
        // Clean strong uptrend by percent and fit, but only 10 units of movement.
        let prices = [20.0, 22.0, 24.0, 26.0, 28.0, 30.0];
        let config = TrendConfig::default();
        let analyzer = TrendAnalyzer::new(&config);
        assert!(analyzer.analyze("x", &series(&prices)).is_none());

        let relaxed = TrendAnalyzer::new(&config).with_min_abs_change(0.0);
        let result = relaxed.analyze("x", &series(&prices)).unwrap();
        assert_eq!(result.trend_label, TrendLabel::StrongUptrend);
        assert_relative_eq!(result.change, 10.0);
    }

    #[test]
    fn test_absent_points_and_unsorted_input() {
        let points = vec![
            PricePoint::new(2 * DAY, Some(300.0)),
            PricePoint::new(0, Some(100.0)),
            PricePoint::new(DAY, None),
            PricePoint::new(DAY, Some(200.0)),
            PricePoint::new(3 * DAY, Some(400.0)),
            PricePoint::new(4 * DAY, Some(500.0)),
        ];
        let analyzer = TrendAnalyzer::new(&TrendConfig::default());
        let result = analyzer.analyze("x", &points).unwrap();
        assert_eq!(result.first, 100.0);
        assert_eq!(result.last, 500.0);
        assert_relative_eq!(result.percent, 400.0);
    }

    #[test]
    fn test_zero_first_price_gives_zero_percent() {
        let analyzer = TrendAnalyzer::new(&TrendConfig::default()).with_min_points(2);
        let points = vec![PricePoint::new(0, Some(0.0)), PricePoint::new(DAY, Some(100.0))];
        let result = analyzer.analyze("x", &points).unwrap();
        assert_eq!(result.percent, 0.0);
    }

    #[test]
    fn test_volatile_series() {
        let prices = [1000.0, 1600.0, 900.0, 1700.0, 800.0, 1500.0, 1100.0];
        let analyzer = TrendAnalyzer::new(&TrendConfig::default());
        let result = analyzer.analyze("x", &series(&prices)).unwrap();
        assert!(result.volatility_cv > 0.2);
        assert!(result.r2 < 0.7);
        assert_eq!(result.trend_label, TrendLabel::Volatile);
    }

    #[test]
    fn test_end_to_end_three_points() {
        let prices = [99.0, 119.0, 149.0];
        let analyzer = TrendAnalyzer::new(&TrendConfig::default())
            .with_min_points(3)
            .with_min_abs_change(0.0);
        let result = analyzer.analyze("X", &series(&prices)).unwrap();
        assert_relative_eq!(result.percent, 50.0 / 99.0 * 100.0, epsilon = 1e-9);
        assert_eq!((result.ups, result.downs), (2, 0));
        assert!(result.r2 >= 0.7);
        assert_eq!(result.trend_label, TrendLabel::StrongUptrend);
    }

    #[test]
    fn test_simple_analyzer_labels() {
        let analyzer = SimpleTrendAnalyzer::new(&TrendConfig::default());

        let strong = analyzer.analyze("a", &series(&[10.0, 11.0, 12.0, 13.0])).unwrap();
        assert_eq!(strong.trend_label, TrendLabel::StrongTrend);
        assert_eq!(strong.r2, 0.0);

        let volatile = analyzer.analyze("b", &series(&[100.0, 150.0, 130.0])).unwrap();
        assert_eq!(volatile.trend_label, TrendLabel::Volatile);

        let flat = analyzer.analyze("c", &series(&[100.0, 99.0, 102.0])).unwrap();
        assert_eq!(flat.trend_label, TrendLabel::Flat);

        let uncertain = analyzer.analyze("d", &series(&[100.0, 110.0, 110.0])).unwrap();
        assert_eq!(uncertain.trend_label, TrendLabel::Uncertain);

        assert!(analyzer.analyze("e", &series(&[1.0, 2.0])).is_none());
    }
}
