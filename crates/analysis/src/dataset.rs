//! The published compact dataset artifact.
//!
//! Wire layout (compact JSON, keys in this order):
//! `{"items":[..],"rows":[[ts,idx,tier,ask,bid],..],"config":{..},"trends_3d":[..],..}`
//! with one `trends_<N>d` key per analysis window. A `.gz` output path gets
//! the same document gzip-compressed.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use market_core::{AllowList, CompactRow, Error, OrderedMap, Result, TrendResult};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ranked results for one analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTrends {
    pub days: u32,
    pub results: Vec<TrendResult>,
}

impl WindowTrends {
    /// Key used in the artifact, e.g. `trends_7d`.
    pub fn key(&self) -> String {
        format!("trends_{}d", self.days)
    }
}

/// Change-log plus trend lists, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactDataset {
    /// Item ids in first-seen order; rows index into this.
    pub items: Vec<String>,
    pub rows: Vec<CompactRow>,
    /// Allow-list the run used, echoed unchanged.
    pub config: AllowList,
    /// One entry per window, in configured order.
    pub trends: Vec<WindowTrends>,
}

impl CompactDataset {
    /// Results for a window, if it was analyzed.
    pub fn trends_for(&self, days: u32) -> Option<&[TrendResult]> {
        self.trends
            .iter()
            .find(|w| w.days == days)
            .map(|w| w.results.as_slice())
    }

    /// Serialize without superfluous whitespace.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Write to `path` through a sibling `<name>.tmp` file, so a failed run
    /// never leaves a truncated artifact behind. Paths ending in `.gz` are
    /// gzip-compressed. Returns the size written.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let tmp = temp_path(path);

        let written = self
            .write_file(&tmp, is_gzip(path))
            .and_then(|()| std::fs::rename(&tmp, path).map_err(Error::from));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(std::fs::metadata(path)?.len())
    }

    fn write_file(&self, path: &Path, gzip: bool) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        if gzip {
            let mut encoder = GzEncoder::new(&mut writer, Compression::default());
            self.to_writer(&mut encoder)?;
            encoder.finish()?;
        } else {
            self.to_writer(&mut writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Parse an artifact produced by [`to_writer`](Self::to_writer).
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Serialize for CompactDataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.trends.len()))?;
        map.serialize_entry("items", &self.items)?;
        map.serialize_entry("rows", &self.rows)?;
        map.serialize_entry("config", &self.config)?;
        for window in &self.trends {
            map.serialize_entry(&window.key(), &window.results)?;
        }
        map.end()
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

/// `market.compact.json` -> `market.compact.json.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[derive(Deserialize)]
struct RawDataset {
    items: Vec<String>,
    rows: Vec<CompactRow>,
    config: AllowList,
    #[serde(flatten)]
    windows: OrderedMap<Vec<TrendResult>>,
}

fn window_days(key: &str) -> Option<u32> {
    key.strip_prefix("trends_")?.strip_suffix('d')?.parse().ok()
}

impl<'de> Deserialize<'de> for CompactDataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawDataset::deserialize(deserializer)?;

        let mut trends = Vec::with_capacity(raw.windows.len());
        for (key, results) in raw.windows {
            let days = window_days(&key)
                .ok_or_else(|| serde::de::Error::custom(format!("unexpected key `{key}`")))?;
            trends.push(WindowTrends { days, results });
        }

        let dataset = CompactDataset {
            items: raw.items,
            rows: raw.rows,
            config: raw.config,
            trends,
        };
        dataset.check_indices().map_err(serde::de::Error::custom)?;
        Ok(dataset)
    }
}

impl CompactDataset {
    /// Every row must point into `items`.
    fn check_indices(&self) -> Result<()> {
        match self.rows.iter().find(|r| r.item_index >= self.items.len()) {
            Some(row) => Err(Error::data(format!(
                "row at ts {} references item {} but only {} items exist",
                row.ts,
                row.item_index,
                self.items.len()
            ))),
            None => Ok(()),
        }
    }
}
