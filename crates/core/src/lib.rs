//! Core types and configuration for the market-trends system.
//!
//! This crate provides shared types used across all other crates:
//! - Snapshot and quote types
//! - Compact change-log rows and trend results
//! - Configuration structures and the item allow-list
//! - Common error types

pub mod config;
pub mod error;
pub mod ordered;
pub mod types;

pub use config::{AllowList, Config};
pub use error::{Error, Result};
pub use ordered::OrderedMap;
pub use types::*;
