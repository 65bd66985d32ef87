//! Snapshot ingestion and normalization for the market-trends system.
//!
//! This crate handles:
//! - Discovering snapshot documents and their capture timestamps
//! - Parsing quotes into typed, sentinel-free values
//! - Narrowing the item universe to the configured allow-list

pub mod filter;
pub mod reader;

pub use filter::ItemFilter;
pub use reader::{ReadStats, SnapshotReader, TimeWindow};
