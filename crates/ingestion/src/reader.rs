//! Snapshot directory reader.
//!
//! Discovers snapshot documents, derives their capture timestamps, and parses
//! the `marketData` payload into [`Snapshot`] records. Files whose timestamp
//! cannot be derived are skipped silently; documents that fail to parse are
//! skipped with a warning. Only an unreadable directory aborts the run.

use std::path::{Path, PathBuf};

use market_core::config::{ReaderConfig, TimestampSource};
use market_core::{
    days_to_secs, format_ts, Error, ItemQuotes, OrderedMap, Quote, Result, Snapshot, Tier,
    TimestampSecs,
};
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Inclusive time range `[start, end]` in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: TimestampSecs,
    pub end: TimestampSecs,
}

impl TimeWindow {
    pub fn new(start: TimestampSecs, end: TimestampSecs) -> Self {
        Self { start, end }
    }

    /// The `days`-long window ending at `reference`.
    pub fn ending_at(reference: TimestampSecs, days: u32) -> Self {
        Self {
            start: reference.saturating_sub(days_to_secs(days)),
            end: reference,
        }
    }

    #[inline]
    pub fn contains(&self, ts: TimestampSecs) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Counters from the last directory scan.
#[derive(Debug, Clone, Default)]
pub struct ReadStats {
    /// Directory entries with the snapshot extension.
    pub files_seen: u64,
    /// Files without a derivable timestamp.
    pub skipped_timestamp: u64,
    /// Files outside the requested window.
    pub skipped_window: u64,
    /// Files that could not be read or parsed.
    pub skipped_malformed: u64,
    /// Snapshots returned.
    pub loaded: u64,
    /// Individual item/tier entries dropped for malformed fields.
    pub skipped_quotes: u64,
}

impl ReadStats {
    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Reads timestamped snapshot documents from a directory.
pub struct SnapshotReader {
    dir: PathBuf,
    timestamp_source: TimestampSource,
    extension: String,
    stats: ReadStats,
}

impl SnapshotReader {
    /// Create a reader over `dir`.
    pub fn new(dir: impl Into<PathBuf>, config: &ReaderConfig) -> Self {
        Self {
            dir: dir.into(),
            timestamp_source: config.timestamp_source,
            extension: config.extension.clone(),
            stats: ReadStats::default(),
        }
    }

    /// Directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Statistics from the last [`load`](Self::load).
    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Load every snapshot whose timestamp falls in `window`, sorted by
    /// timestamp.
    pub fn load(&mut self, window: TimeWindow) -> Result<Vec<Snapshot>> {
        self.stats.reset();
        let mut snapshots = Vec::new();

        for path in self.candidate_files()? {
            self.stats.files_seen += 1;

            // File-name timestamps let us skip out-of-window files unread.
            let name_ts = match self.timestamp_source {
                TimestampSource::FileName => match timestamp_from_file_name(&path) {
                    Some(ts) if !window.contains(ts) => {
                        self.stats.skipped_window += 1;
                        continue;
                    }
                    Some(ts) => Some(ts),
                    None => {
                        debug!(path = %path.display(), "skipping file without epoch name");
                        self.stats.skipped_timestamp += 1;
                        continue;
                    }
                },
                TimestampSource::Embedded => None,
            };

            let parsed = match read_document(&path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(error = %e, "skipping snapshot");
                    self.stats.skipped_malformed += 1;
                    continue;
                }
            };

            let ts = match name_ts.or(parsed.embedded_ts) {
                Some(ts) => ts,
                None => {
                    debug!(path = %path.display(), "skipping snapshot without timestamp field");
                    self.stats.skipped_timestamp += 1;
                    continue;
                }
            };
            if !window.contains(ts) {
                self.stats.skipped_window += 1;
                continue;
            }

            self.stats.skipped_quotes += parsed.skipped_quotes;
            snapshots.push((
                path,
                Snapshot {
                    ts,
                    items: parsed.items,
                },
            ));
        }

        // Ties cannot happen for well-formed directories; the path keeps the
        // order reproducible if they do.
        snapshots.sort_by(|(pa, a), (pb, b)| a.ts.cmp(&b.ts).then_with(|| pa.cmp(pb)));
        self.stats.loaded = snapshots.len() as u64;

        if let (Some((_, first)), Some((_, last))) = (snapshots.first(), snapshots.last()) {
            info!(
                dir = %self.dir.display(),
                loaded = self.stats.loaded,
                skipped = self.stats.skipped_timestamp + self.stats.skipped_malformed,
                from = %format_ts(first.ts),
                to = %format_ts(last.ts),
                "loaded snapshots"
            );
        } else {
            info!(dir = %self.dir.display(), "no snapshots in window");
        }

        Ok(snapshots.into_iter().map(|(_, s)| s).collect())
    }

    /// Regular files in the directory carrying the snapshot extension.
    fn candidate_files(&self) -> Result<Vec<PathBuf>> {
        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| Error::snapshot_dir(&self.dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::snapshot_dir(&self.dir, e))?;
            let path = entry.path();
            let matches_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == self.extension);
            if matches_ext && path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }
}

/// Epoch seconds encoded in the file stem, e.g. `1700000000.json`.
fn timestamp_from_file_name(path: &Path) -> Option<TimestampSecs> {
    path.file_stem()?.to_str()?.parse().ok()
}

#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(rename = "marketData", default)]
    market_data: OrderedMap<RawLevels>,
    #[serde(default)]
    timestamp: Option<Value>,
}

/// Per-item tier mapping; anything that is not an object is tolerated and
/// dropped.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLevels {
    Levels(OrderedMap<Value>),
    Malformed(IgnoredAny),
}

struct ParsedDocument {
    embedded_ts: Option<TimestampSecs>,
    items: Vec<ItemQuotes>,
    skipped_quotes: u64,
}

/// Read and parse one file; failures carry the file path.
fn read_document(path: &Path) -> Result<ParsedDocument> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::snapshot(path, e.to_string()))?;
    parse_document(&text).map_err(|e| Error::snapshot(path, e.to_string()))
}

fn parse_document(text: &str) -> Result<ParsedDocument> {
    let raw: RawSnapshot = serde_json::from_str(text)?;
    let mut skipped_quotes = 0;
    let mut items = Vec::with_capacity(raw.market_data.len());

    for (item, levels) in raw.market_data {
        let levels = match levels {
            RawLevels::Levels(levels) => levels,
            RawLevels::Malformed(_) => {
                skipped_quotes += 1;
                continue;
            }
        };

        let mut tiers = Vec::with_capacity(levels.len());
        for (tier, payload) in levels.iter() {
            match (tier.parse::<Tier>().ok(), parse_quote(payload)) {
                (Some(tier), Some(quote)) => tiers.push((tier, quote)),
                _ => skipped_quotes += 1,
            }
        }
        items.push(ItemQuotes { item, tiers });
    }

    Ok(ParsedDocument {
        embedded_ts: raw.timestamp.as_ref().and_then(timestamp_from_value),
        items,
        skipped_quotes,
    })
}

/// `{"a": int, "b": int}`; both sides are required.
fn parse_quote(payload: &Value) -> Option<Quote> {
    let ask = payload.get("a")?.as_i64()?;
    let bid = payload.get("b")?.as_i64()?;
    Some(Quote::from_raw(ask, bid))
}

fn timestamp_from_value(value: &Value) -> Option<TimestampSecs> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
