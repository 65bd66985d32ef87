//! Ranking and truncation of trend results.

use std::cmp::Reverse;

use market_core::TrendResult;
use ordered_float::OrderedFloat;

/// Sort key for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankOrder {
    /// Largest move in either direction first.
    #[default]
    AbsPercent,
    /// Largest gain first.
    SignedPercent,
}

/// Sorts results by percent change and keeps the top `n`.
#[derive(Debug, Clone)]
pub struct Ranker {
    top_n: usize,
    order: RankOrder,
}

impl Ranker {
    pub fn new(top_n: usize, order: RankOrder) -> Self {
        Self { top_n, order }
    }

    /// Rank descending by the configured key. Ties keep input order.
    pub fn rank(&self, mut results: Vec<TrendResult>) -> Vec<TrendResult> {
        match self.order {
            RankOrder::AbsPercent => {
                results.sort_by_key(|r| Reverse(OrderedFloat(r.percent.abs())))
            }
            RankOrder::SignedPercent => results.sort_by_key(|r| Reverse(OrderedFloat(r.percent))),
        }
        results.truncate(self.top_n);
        results
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(15, RankOrder::AbsPercent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::TrendLabel;

    fn result(item: &str, percent: f64) -> TrendResult {
        TrendResult {
            item: item.to_string(),
            first: 100.0,
            last: 100.0 + percent,
            change: percent,
            percent,
            ups: 0,
            downs: 0,
            slope_per_day: 0.0,
            r2: 0.0,
            volatility_cv: 0.0,
            trend_label: TrendLabel::Uncertain,
        }
    }

    fn percents(results: &[TrendResult]) -> Vec<f64> {
        results.iter().map(|r| r.percent).collect()
    }

    #[test]
    fn test_rank_by_magnitude() {
        let input = vec![result("a", 12.0), result("b", -40.0), result("c", 5.0), result("d", -60.0)];
        let ranked = Ranker::default().rank(input);
        assert_eq!(percents(&ranked), vec![-60.0, -40.0, 12.0, 5.0]);
    }

    #[test]
    fn test_rank_signed() {
        let input = vec![result("a", 12.0), result("b", -40.0), result("c", 5.0), result("d", -60.0)];
        let ranked = Ranker::new(15, RankOrder::SignedPercent).rank(input);
        assert_eq!(percents(&ranked), vec![12.0, 5.0, -40.0, -60.0]);
    }

    #[test]
    fn test_truncate_to_top_n() {
        let input: Vec<TrendResult> = (0..20).map(|i| result(&format!("i{i}"), i as f64)).collect();
        let ranked = Ranker::new(15, RankOrder::AbsPercent).rank(input);
        assert_eq!(ranked.len(), 15);
        assert_eq!(ranked[0].percent, 19.0);
        assert_eq!(ranked[14].percent, 5.0);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let input = vec![result("first", 10.0), result("second", -10.0), result("third", 10.0)];
        let ranked = Ranker::default().rank(input);
        let items: Vec<&str> = ranked.iter().map(|r| r.item.as_str()).collect();
        assert_eq!(items, vec!["first", "second", "third"]);
    }
}
