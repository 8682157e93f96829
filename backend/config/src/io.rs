//! Config file location and parsing.

use crate::schema::AquadashConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Config file used when neither a flag nor `AQUADASH_CONFIG` names one.
const CONFIG_FILE_NAME: &str = "aquadash.yaml";

/// Resolve the config file path.
/// Priority: explicit path > `AQUADASH_CONFIG` env > `./aquadash.yaml`
pub fn config_file_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("AQUADASH_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Read the config file as a raw JSON value tree.
///
/// Returns `Ok(None)` if the file doesn't exist (defaults apply).
pub async fn load_raw(path: &Path) -> Result<Option<serde_json::Value>> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let value: serde_json::Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(Some(value))
}

/// Parse an already-substituted value tree into the typed config.
pub fn parse_config(value: serde_json::Value) -> Result<AquadashConfig> {
    if value.is_null() {
        return Ok(AquadashConfig::default());
    }
    serde_json::from_value(value).context("Failed to deserialize config")
}
