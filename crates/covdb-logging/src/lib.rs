//! Logging configuration for covdb tools.
//!
//! Libraries only emit `tracing` events; binaries describe how to show them
//! with a [`LoggingConfig`] and call [`LoggingConfig::init`] once.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Log level for filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Check if this level should log messages at the given level
    pub fn should_log(&self, level: LogLevel) -> bool {
        *self >= level
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => bail!("unknown log level {other:?}"),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level to output
    #[serde(default)]
    pub level: LogLevel,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
    /// Enable timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,
    /// Per-crate levels, keyed by target (`covdb_merge`, `covdb_merge_sql`, ...)
    #[serde(default)]
    pub component_levels: BTreeMap<String, LogLevel>,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Plain,
            timestamps: true,
            component_levels: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_component_level(mut self, component: impl Into<String>, level: LogLevel) -> Self {
        self.component_levels.insert(component.into(), level);
        self
    }

    /// Get the effective log level for a component
    pub fn effective_level(&self, component: Option<&str>) -> LogLevel {
        component
            .and_then(|c| self.component_levels.get(c).copied())
            .unwrap_or(self.level)
    }

    /// `EnvFilter` directives: the base level, then one per component.
    pub fn filter_directives(&self) -> String {
        let mut out = self.level.as_str().to_string();
        for (component, level) in &self.component_levels {
            out.push_str(&format!(",{component}={level}"));
        }
        out
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return EnvFilter::try_from_default_env()
                .map_err(|e| anyhow!("invalid {}: {e}", EnvFilter::DEFAULT_ENV));
        }
        EnvFilter::try_new(self.filter_directives())
            .map_err(|e| anyhow!("invalid log filter {:?}: {e}", self.filter_directives()))
    }

    /// Install the global subscriber, writing to stderr. `RUST_LOG`
    /// overrides the configured levels when set.
    pub fn init(&self) -> Result<()> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter()?)
            .with_writer(std::io::stderr);
        let installed = match (self.format, self.timestamps) {
            (LogFormat::Plain, true) => builder.try_init(),
            (LogFormat::Plain, false) => builder.without_time().try_init(),
            (LogFormat::Compact, true) => builder.compact().try_init(),
            (LogFormat::Compact, false) => builder.compact().without_time().try_init(),
            (LogFormat::Json, true) => builder.json().try_init(),
            (LogFormat::Json, false) => builder.json().without_time().try_init(),
        };
        installed.map_err(|e| anyhow!("install log subscriber: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_ordering() {
        assert!(LogLevel::Info.should_log(LogLevel::Info));
        assert!(LogLevel::Info.should_log(LogLevel::Warn));
        assert!(LogLevel::Info.should_log(LogLevel::Error));
        assert!(!LogLevel::Info.should_log(LogLevel::Debug));
    }

    #[test]
    fn directives_list_components_in_order() {
        let config = LoggingConfig::new()
            .with_level(LogLevel::Warn)
            .with_component_level("covdb_merge_sql", LogLevel::Trace)
            .with_component_level("covdb_merge", LogLevel::Debug);
        assert_eq!(
            config.filter_directives(),
            "warn,covdb_merge=debug,covdb_merge_sql=trace"
        );
        assert_eq!(config.effective_level(Some("covdb_merge")), LogLevel::Debug);
        assert_eq!(config.effective_level(Some("other")), LogLevel::Warn);
        assert!(EnvFilter::try_new(config.filter_directives()).is_ok());
    }

    #[test]
    fn partial_yaml_takes_defaults() {
        let config: LoggingConfig = serde_yaml::from_str("format: json\n").unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.timestamps);
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(LoggingConfig::default()).unwrap();
        assert_eq!(json["level"], "info");
        assert_eq!(json["format"], "plain");
    }

    #[test]
    fn level_parse_rejects_garbage() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
