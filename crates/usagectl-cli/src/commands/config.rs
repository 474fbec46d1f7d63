//! `usagectl config` command implementation
//!
//! Gets, sets, and shows values of the persisted configuration document.

use crate::config::Config;
use crate::error::Result;
use colored::Colorize;
use std::path::Path;

/// Print one configuration value
pub async fn get(config_path: &Path, key: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    println!("{}", config.get(key)?);
    Ok(())
}

/// Update one configuration value and persist the document
pub async fn set(config_path: &Path, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load(config_path)?;
    config.set(key, value)?;
    config.save(config_path)?;
    println!("{} Set {} = {}", "✓".green(), key, value);
    Ok(())
}

/// Print the whole configuration document
pub async fn show(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
