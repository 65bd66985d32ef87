use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use market_core::Config;

/// Environment prefix for overrides, e.g. `MARKET_RANK__TOP_N=20`.
pub const ENV_PREFIX: &str = "MARKET_";

/// Loads run configuration.
///
/// Layers, later wins: built-in defaults, the optional TOML file, then
/// `MARKET_`-prefixed environment variables (`__` separates nested keys).
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = path {
        anyhow::ensure!(path.exists(), "config file {} not found", path.display());
        figment = figment.merge(Toml::file(path));
    }
    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("invalid configuration")?;

    config.validate()?;
    Ok(config)
}
