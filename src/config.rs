//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. User values are
//! layered over stock defaults, so a site's config file only needs the keys
//! it wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! my-site/
//! ├── config.toml      # optional
//! ├── documents/
//! ├── layouts/
//! ├── files/
//! └── data/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! url = ""                  # Absolute site URL, used for FullUrl
//! root_url = "/"            # URL prefix every page is served under
//! output = "build"          # Output folder, relative to the site root
//! default_layout = "default"
//!
//! [folders]
//! documents = "documents"
//! files = "files"
//! layouts = "layouts"
//! data = "data"
//!
//! [urls]
//! clean_urls = true         # about.html → about/index.html
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [io]
//! retries = 3               # Extra attempts when a source file can't be read
//! retry_delay_ms = 100
//!
//! [metadata]                # Free-form values exposed as site metadata
//! title = "My Site"
//! ```
//!
//! Unknown keys are rejected to catch typos early (except under `[metadata]`).

use crate::content::{MetaValue, MetadataCollection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute site URL (`https://example.com/`), used for full URLs.
    pub url: String,
    /// URL prefix all output is served under.
    pub root_url: String,
    /// Output folder, relative to the site root unless absolute.
    pub output: String,
    /// Layout applied to HTML documents that don't name one.
    pub default_layout: String,
    pub folders: FoldersConfig,
    pub urls: UrlsConfig,
    pub processing: ProcessingConfig,
    pub io: IoConfig,
    /// Free-form site metadata.
    pub metadata: toml::Table,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            root_url: "/".to_string(),
            output: "build".to_string(),
            default_layout: "default".to_string(),
            folders: FoldersConfig::default(),
            urls: UrlsConfig::default(),
            processing: ProcessingConfig::default(),
            io: IoConfig::default(),
            metadata: toml::Table::new(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.root_url.starts_with('/') && !self.root_url.contains("://") {
            return Err(ConfigError::Validation(
                "root_url must start with '/' or be an absolute URL".into(),
            ));
        }
        if self.output.trim().is_empty() {
            return Err(ConfigError::Validation("output must not be empty".into()));
        }
        let folders = [
            &self.folders.documents,
            &self.folders.files,
            &self.folders.layouts,
            &self.folders.data,
        ];
        if folders.iter().any(|f| f.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "folders entries must not be empty".into(),
            ));
        }
        for (i, a) in folders.iter().enumerate() {
            if folders[i + 1..].contains(a) {
                return Err(ConfigError::Validation(format!(
                    "folders entries must be distinct ('{a}' is used twice)"
                )));
            }
        }
        if self.io.retries > 20 {
            return Err(ConfigError::Validation("io.retries must be 0-20".into()));
        }
        Ok(())
    }

    /// `[metadata]` as a metadata collection.
    pub fn site_metadata(&self) -> MetadataCollection {
        let mut metadata = MetadataCollection::new();
        for (key, value) in &self.metadata {
            metadata.add(key, toml_to_meta(value));
        }
        metadata
    }
}

fn toml_to_meta(value: &toml::Value) -> MetaValue {
    match value {
        toml::Value::String(s) => MetaValue::Text(s.clone()),
        toml::Value::Integer(n) => MetaValue::Int(*n),
        toml::Value::Boolean(b) => MetaValue::Bool(*b),
        toml::Value::Datetime(dt) => {
            let text = dt.to_string();
            crate::naming::parse_date(&text).map_or(MetaValue::Text(text), MetaValue::Date)
        }
        toml::Value::Array(items) if items.iter().all(toml::Value::is_str) => MetaValue::List(
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        ),
        other => serde_json::to_value(other)
            .map(MetaValue::Json)
            .unwrap_or_else(|_| MetaValue::Text(other.to_string())),
    }
}

/// Names of the four source folders, relative to the site root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FoldersConfig {
    pub documents: String,
    pub files: String,
    pub layouts: String,
    pub data: String,
}

impl Default for FoldersConfig {
    fn default() -> Self {
        Self {
            documents: "documents".to_string(),
            files: "files".to_string(),
            layouts: "layouts".to_string(),
            data: "data".to_string(),
        }
    }
}

/// URL shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UrlsConfig {
    /// Site-wide default for clean URLs; documents can still opt out.
    pub clean_urls: bool,
}

impl Default for UrlsConfig {
    fn default() -> Self {
        Self { clean_urls: true }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Retry policy for reading source files that are briefly unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IoConfig {
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay_ms: 100,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the site root.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Folio Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Absolute site URL, used to build FullUrl (e.g. "https://example.com/").
url = ""

# URL prefix every page is served under.
root_url = "/"

# Output folder, relative to the site root.
output = "build"

# Layout applied to HTML documents that don't name one with `layout:`.
default_layout = "default"

# ---------------------------------------------------------------------------
# Source folders, relative to the site root
# ---------------------------------------------------------------------------
[folders]
documents = "documents"
files = "files"
layouts = "layouts"
data = "data"

# ---------------------------------------------------------------------------
# URLs
# ---------------------------------------------------------------------------
[urls]
# Rewrite about.html to about/index.html. Documents can opt out with
# `DisableCleanUrls: true` in their front matter.
clean_urls = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# File reads
# ---------------------------------------------------------------------------
[io]
# Extra attempts when a source file is locked or briefly unavailable.
retries = 3
retry_delay_ms = 100

# ---------------------------------------------------------------------------
# Site metadata, available to templates as Site.<key>
# ---------------------------------------------------------------------------
[metadata]
# title = "My Site"
"##
}
