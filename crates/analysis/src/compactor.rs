//! Change-log compaction.
//!
//! Turns a sorted stream of full snapshots into the minimal list of quote
//! changes. Replaying the rows with "last write wins" per (item, tier)
//! reconstructs the quote state at any input timestamp.

use std::collections::HashMap;

use market_core::{CompactRow, Quote, Snapshot, Tier, TimestampSecs};
use market_ingestion::ItemFilter;
use tracing::debug;

/// Statistics about compaction effectiveness.
#[derive(Debug, Clone, Default)]
pub struct CompactionStats {
    /// Snapshots consumed.
    pub snapshots: u64,
    /// Item/tier quotes inspected (after filtering).
    pub quotes_seen: u64,
    /// Quotes skipped because neither side had an order.
    pub no_trade: u64,
    /// Quotes skipped because they repeated the last emitted pair.
    pub unchanged: u64,
    /// Rows emitted.
    pub rows: u64,
}

impl CompactionStats {
    /// Fraction of inspected quotes that became rows.
    pub fn retention_ratio(&self) -> f64 {
        if self.quotes_seen > 0 {
            self.rows as f64 / self.quotes_seen as f64
        } else {
            0.0
        }
    }
}

/// Builds the deduplicated change-log.
///
/// Snapshots must be pushed in non-decreasing timestamp order; the compactor
/// carries `last_seen` state from one snapshot to the next.
pub struct DeltaCompactor {
    filter: ItemFilter,
    /// Item ids in first-seen order.
    items: Vec<String>,
    /// Position of each id in `items`.
    index: HashMap<String, usize>,
    /// Last emitted quote per (item index, tier).
    last_seen: HashMap<(usize, Tier), Quote>,
    rows: Vec<CompactRow>,
    last_ts: Option<TimestampSecs>,
    stats: CompactionStats,
}

impl DeltaCompactor {
    /// Create a compactor that keeps only items passing `filter`.
    pub fn new(filter: ItemFilter) -> Self {
        Self {
            filter,
            items: Vec::new(),
            index: HashMap::new(),
            last_seen: HashMap::new(),
            rows: Vec::new(),
            last_ts: None,
            stats: CompactionStats::default(),
        }
    }

    /// Consume one snapshot.
    pub fn push_snapshot(&mut self, snapshot: &Snapshot) {
        if let Some(prev) = self.last_ts {
            if snapshot.ts < prev {
                debug!(ts = snapshot.ts, prev, "snapshot out of order");
            }
        }
        self.last_ts = Some(snapshot.ts);
        self.stats.snapshots += 1;

        for quotes in &snapshot.items {
            if !self.filter.allows(&quotes.item) {
                continue;
            }
            // Index is assigned before tiers are inspected, so an item that
            // only ever shows empty books still gets a slot.
            let item_index = self.intern(&quotes.item);

            for &(tier, quote) in &quotes.tiers {
                self.stats.quotes_seen += 1;
                if quote.is_no_trade() {
                    self.stats.no_trade += 1;
                    continue;
                }

                let key = (item_index, tier);
                if self.last_seen.get(&key) == Some(&quote) {
                    self.stats.unchanged += 1;
                    continue;
                }

                self.last_seen.insert(key, quote);
                self.rows.push(CompactRow {
                    ts: snapshot.ts,
                    item_index,
                    tier,
                    quote,
                });
                self.stats.rows += 1;
            }
        }
    }

    /// Consume a sorted batch of snapshots.
    pub fn push_snapshots<'a>(&mut self, snapshots: impl IntoIterator<Item = &'a Snapshot>) {
        for snapshot in snapshots {
            self.push_snapshot(snapshot);
        }
    }

    fn intern(&mut self, item: &str) -> usize {
        if let Some(&i) = self.index.get(item) {
            return i;
        }
        let i = self.items.len();
        self.items.push(item.to_string());
        self.index.insert(item.to_string(), i);
        i
    }

    /// Item ids in first-seen order.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Rows emitted so far.
    pub fn rows(&self) -> &[CompactRow] {
        &self.rows
    }

    /// Compaction statistics.
    pub fn stats(&self) -> &CompactionStats {
        &self.stats
    }

    /// Finish and hand over `(items, rows)`.
    pub fn finish(self) -> (Vec<String>, Vec<CompactRow>) {
        (self.items, self.rows)
    }
}

/// Reconstruct the quote state at `at` from a change-log.
///
/// Keys are `(item_index, tier)`; a key is absent if it was never set at or
/// before `at`. Rows must be in the order the compactor produced them.
pub fn replay(rows: &[CompactRow], at: TimestampSecs) -> HashMap<(usize, Tier), Quote> {
    let mut state = HashMap::new();
    for row in rows.iter().take_while(|r| r.ts <= at) {
        state.insert((row.item_index, row.tier), row.quote);
    }
    state
}
