//! Core data types for the market-trends system.

use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Timestamp in seconds since Unix epoch (UTC).
pub type TimestampSecs = i64;

/// Order-book depth level. Tier 0 is top-of-book.
pub type Tier = u32;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Wire sentinel for "no active order on this side".
pub const NO_ORDER: i64 = -1;

/// Length of a window of `days` in seconds.
#[inline]
pub fn days_to_secs(days: u32) -> i64 {
    days as i64 * SECONDS_PER_DAY
}

/// Render a timestamp as RFC 3339 for logs. Falls back to the raw number.
pub fn format_ts(ts: TimestampSecs) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

/// Ask/bid pair at one tier, as captured.
///
/// A side without an active order is `None` rather than the `-1` wire
/// sentinel. Other values are kept exactly as captured so the change-log can
/// compare them bit for bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quote {
    /// Sell-side price.
    pub ask: Option<i64>,
    /// Buy-side price.
    pub bid: Option<i64>,
}

impl Quote {
    /// Build a quote from raw wire values.
    pub fn from_raw(ask: i64, bid: i64) -> Self {
        Self {
            ask: decode_side(ask),
            bid: decode_side(bid),
        }
    }

    /// Raw wire values, sentinel included.
    pub fn to_raw(self) -> (i64, i64) {
        (encode_side(self.ask), encode_side(self.bid))
    }

    /// Neither side has an active order.
    #[inline]
    pub fn is_no_trade(&self) -> bool {
        self.ask.is_none() && self.bid.is_none()
    }

    /// Ask if it is a usable price (> 0).
    #[inline]
    pub fn valid_ask(&self) -> Option<i64> {
        self.ask.filter(|&v| v > 0)
    }

    /// Bid if it is a usable price (> 0).
    #[inline]
    pub fn valid_bid(&self) -> Option<i64> {
        self.bid.filter(|&v| v > 0)
    }

    /// Representative price: mid when both sides are valid, otherwise the
    /// valid side, otherwise nothing.
    pub fn representative_price(&self) -> Option<f64> {
        match (self.valid_ask(), self.valid_bid()) {
            (Some(a), Some(b)) => Some((a as f64 + b as f64) / 2.0),
            (Some(a), None) => Some(a as f64),
            (None, Some(b)) => Some(b as f64),
            (None, None) => None,
        }
    }
}

#[inline]
fn decode_side(raw: i64) -> Option<i64> {
    (raw != NO_ORDER).then_some(raw)
}

#[inline]
fn encode_side(side: Option<i64>) -> i64 {
    side.unwrap_or(NO_ORDER)
}

/// All tiers quoted for one item in one snapshot, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemQuotes {
    pub item: String,
    pub tiers: Vec<(Tier, Quote)>,
}

impl ItemQuotes {
    /// Quote at a given tier, if present.
    pub fn tier(&self, tier: Tier) -> Option<&Quote> {
        self.tiers.iter().find(|(t, _)| *t == tier).map(|(_, q)| q)
    }
}

/// One full capture of the marketplace.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Capture time.
    pub ts: TimestampSecs,
    /// Items in document order.
    pub items: Vec<ItemQuotes>,
}

/// One change event in the deduplicated quote history.
///
/// Serialized as the 5-element array `[ts, item_index, tier, ask, bid]`
/// with `-1` for an absent side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactRow {
    pub ts: TimestampSecs,
    /// Index into the dataset's `items` array.
    pub item_index: usize,
    pub tier: Tier,
    pub quote: Quote,
}

impl Serialize for CompactRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (ask, bid) = self.quote.to_raw();
        (self.ts, self.item_index, self.tier, ask, bid).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CompactRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (ts, item_index, tier, ask, bid) =
            <(TimestampSecs, usize, Tier, i64, i64)>::deserialize(deserializer)?;
        Ok(Self {
            ts,
            item_index,
            tier,
            quote: Quote::from_raw(ask, bid),
        })
    }
}

/// One observation of an item's representative price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub ts: TimestampSecs,
    /// `None` when the item was listed but had no usable price.
    pub price: Option<f64>,
}

impl PricePoint {
    pub fn new(ts: TimestampSecs, price: Option<f64>) -> Self {
        Self { ts, price }
    }
}

/// Trend classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendLabel {
    #[serde(rename = "Flat")]
    Flat,
    #[serde(rename = "Strong Uptrend")]
    StrongUptrend,
    #[serde(rename = "Uptrend")]
    Uptrend,
    #[serde(rename = "Strong Downtrend")]
    StrongDowntrend,
    #[serde(rename = "Downtrend")]
    Downtrend,
    #[serde(rename = "Volatile")]
    Volatile,
    #[serde(rename = "Uncertain")]
    Uncertain,
    /// Produced only by the simple (count-of-increases) analyzer.
    #[serde(rename = "Strong Trend")]
    StrongTrend,
}

impl TrendLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendLabel::Flat => "Flat",
            TrendLabel::StrongUptrend => "Strong Uptrend",
            TrendLabel::Uptrend => "Uptrend",
            TrendLabel::StrongDowntrend => "Strong Downtrend",
            TrendLabel::Downtrend => "Downtrend",
            TrendLabel::Volatile => "Volatile",
            TrendLabel::Uncertain => "Uncertain",
            TrendLabel::StrongTrend => "Strong Trend",
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trend statistics for one item over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub item: String,
    /// First valid price in the window.
    pub first: f64,
    /// Last valid price in the window.
    pub last: f64,
    /// `last - first`.
    pub change: f64,
    /// Change relative to `first`, in percent.
    pub percent: f64,
    /// Adjacent pairs with a strict increase.
    pub ups: u32,
    /// Adjacent pairs with a strict decrease.
    pub downs: u32,
    /// OLS slope of the winsorized series, price units per day.
    pub slope_per_day: f64,
    /// Coefficient of determination of that fit.
    pub r2: f64,
    /// Coefficient of variation of the raw series.
    pub volatility_cv: f64,
    #[serde(rename = "trend")]
    pub trend_label: TrendLabel,
}
