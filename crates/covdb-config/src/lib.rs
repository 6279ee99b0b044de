//! Configuration loading for covdb merges.

use anyhow::Context;
use covdb_logging::LoggingConfig;
use covdb_schema::{MergeOptions, RelationalMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration format types supported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    #[default]
    Yaml,
}

impl ConfigFormat {
    fn for_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Merge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Record a MERGE history entry and copy source TEST records
    #[serde(default = "default_true")]
    pub create_history: bool,

    /// Collapse history into one running summary record
    #[serde(default)]
    pub squash_history: bool,

    /// Set-based path policy: auto, disabled or required
    #[serde(default)]
    pub relational: RelationalMode,

    /// Deepest scope tree the set-based path will map
    #[serde(default = "default_max_mapping_iterations")]
    pub max_mapping_iterations: u32,

    #[serde(default = "default_detach_retries")]
    pub detach_retries: u32,

    #[serde(default = "default_detach_retry_delay_ms")]
    pub detach_retry_delay_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

fn default_max_mapping_iterations() -> u32 {
    MergeOptions::default().max_mapping_iterations
}

fn default_detach_retries() -> u32 {
    MergeOptions::default().detach_retries
}

fn default_detach_retry_delay_ms() -> u64 {
    MergeOptions::default().detach_retry_delay_ms
}

impl Default for MergeConfig {
    fn default() -> Self {
        let options = MergeOptions::default();
        Self {
            create_history: options.create_history,
            squash_history: options.squash_history,
            relational: options.relational,
            max_mapping_iterations: options.max_mapping_iterations,
            detach_retries: options.detach_retries,
            detach_retry_delay_ms: options.detach_retry_delay_ms,
            logging: LoggingConfig::default(),
        }
    }
}

impl MergeConfig {
    /// The options every merge entry point takes.
    pub fn options(&self) -> MergeOptions {
        MergeOptions {
            create_history: self.create_history,
            squash_history: self.squash_history,
            relational: self.relational,
            max_mapping_iterations: self.max_mapping_iterations,
            detach_retries: self.detach_retries,
            detach_retry_delay_ms: self.detach_retry_delay_ms,
        }
    }
}

/// Load configuration from a file
pub fn load_config<P: Into<PathBuf>>(path: P) -> anyhow::Result<MergeConfig> {
    let path = path.into();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;

    match ConfigFormat::for_path(&path) {
        ConfigFormat::Json => serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse JSON config: {}", e)),
        ConfigFormat::Yaml => serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse YAML config: {}", e)),
    }
}

/// Save configuration to a file
pub fn save_config<P: Into<PathBuf>>(config: &MergeConfig, path: P) -> anyhow::Result<()> {
    let path = path.into();
    let contents = match ConfigFormat::for_path(&path) {
        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON config: {}", e))?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)
            .map_err(|e| anyhow::anyhow!("Failed to serialize YAML config: {}", e))?,
    };

    std::fs::write(&path, contents).with_context(|| format!("write config {}", path.display()))?;
    Ok(())
}
