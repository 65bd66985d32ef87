//! Per-item price series reconstruction.
//!
//! Builds one `(timestamp, price)` sequence per item from top-of-book quotes
//! in the snapshots that fall inside a window.

use std::collections::HashMap;

use market_core::{PricePoint, Quote, Snapshot, Tier};
use market_ingestion::{ItemFilter, TimeWindow};

/// Tier used for price derivation.
pub const TOP_OF_BOOK: Tier = 0;

/// How a representative price is derived from a top-of-book quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceSource {
    /// Mid when both sides are valid, otherwise the valid side.
    #[default]
    MidOrSide,
    /// Bid only.
    Bid,
}

impl PriceSource {
    pub fn price(self, quote: &Quote) -> Option<f64> {
        match self {
            PriceSource::MidOrSide => quote.representative_price(),
            PriceSource::Bid => quote.valid_bid().map(|b| b as f64),
        }
    }
}

/// Price history for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSeries {
    pub item: String,
    /// One point per snapshot that listed the item, in timestamp order.
    pub points: Vec<PricePoint>,
}

impl ItemSeries {
    /// Number of points carrying a price.
    pub fn valid_len(&self) -> usize {
        self.points.iter().filter(|p| p.price.is_some()).count()
    }
}

/// Builds per-item price series.
pub struct SeriesBuilder {
    filter: ItemFilter,
    source: PriceSource,
}

impl SeriesBuilder {
    pub fn new(filter: ItemFilter, source: PriceSource) -> Self {
        Self { filter, source }
    }

    /// Build series for every tracked item seen in `snapshots` within
    /// `window`. Items come out in first-seen order.
    ///
    /// An item listed without a tier-0 quote, or with no usable price,
    /// still contributes an absent point for that snapshot.
    pub fn build(&self, snapshots: &[Snapshot], window: TimeWindow) -> Vec<ItemSeries> {
        let mut series: Vec<ItemSeries> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for snapshot in snapshots.iter().filter(|s| window.contains(s.ts)) {
            for quotes in &snapshot.items {
                if !self.filter.allows(&quotes.item) {
                    continue;
                }
                let price = quotes
                    .tier(TOP_OF_BOOK)
                    .and_then(|q| self.source.price(q));

                let i = *index.entry(quotes.item.as_str()).or_insert_with(|| {
                    series.push(ItemSeries {
                        item: quotes.item.clone(),
                        points: Vec::new(),
                    });
                    series.len() - 1
                });
                series[i].points.push(PricePoint::new(snapshot.ts, price));
            }
        }

        series
    }
}
