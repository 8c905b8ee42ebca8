//! Config and catalog file loading.
//!
//! Files ending in `.json` are parsed as JSON, everything else as YAML.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parley_core::{CatalogEntry, NluError};
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, info};

use crate::schema::NluConfig;

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "parley.yaml";

/// Priority: `PARLEY_CONFIG_DIR` env > `~/.parley/`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARLEY_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".parley"),
        None => PathBuf::from(".parley"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

async fn read_document<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {what} file: {}", path.display()))?;
    if is_json(path) {
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {what} JSON at: {}", path.display()))
    } else {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse {what} YAML at: {}", path.display()))
    }
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist.
pub async fn load_config(path: &Path) -> Result<NluConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(NluConfig::default());
    }
    let config: NluConfig = read_document(path, "config").await?;
    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Load a catalog file holding a list of entries.
pub async fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let entries: Vec<CatalogEntry> = read_document(path, "catalog").await?;
    if let Some((i, entry)) = entries
        .iter()
        .enumerate()
        .find(|(_, e)| e.texts().iter().all(|t| t.trim().is_empty()))
    {
        return Err(NluError::Catalog(format!(
            "entry {i} ({}) in {} has no matchable text",
            entry.entity,
            path.display()
        ))
        .into());
    }
    info!(path = %path.display(), entries = entries.len(), "Loaded catalog");
    Ok(entries)
}

/// Append the entries of `config.catalog_path`, resolved against the
/// directory of the config file.
pub async fn merge_catalog_file(mut config: NluConfig, config_path: &Path) -> Result<NluConfig> {
    let Some(catalog_path) = &config.catalog_path else {
        return Ok(config);
    };
    let resolved = if catalog_path.is_absolute() {
        catalog_path.clone()
    } else {
        config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(catalog_path)
    };
    let entries = load_catalog(&resolved).await?;
    config.catalog.extend(entries);
    Ok(config)
}
