//! Logger configuration from files and environment variables

use crate::encoder::EncoderType;
use crate::sink::FileConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing::Level;

/// Serializable logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    /// Level used while not in debug mode
    pub level: LogLevel,

    /// Output encoding
    pub encoder: EncoderType,

    /// Colored levels for the console encoder
    pub color: bool,

    /// Annotate entries with file and line
    pub caller: bool,

    /// Capture stacktraces for errors in debug mode
    pub stacktrace: bool,

    /// Include timestamps
    pub timestamps: bool,

    /// Start in debug mode
    pub debug: bool,

    /// Sink URIs (`stdout`, `stderr`, `file:///path` or a path)
    pub sinks: Vec<String>,

    /// File sink, replaces `sinks` when set
    pub file: Option<FileConfig>,

    /// Field keys dropped from every entry
    pub skip_keys: Vec<String>,
}

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::TRACE => LogLevel::Trace,
            Level::DEBUG => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warn,
            Level::ERROR => LogLevel::Error,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "OFF" => Ok(LogLevel::Off),
            other => Err(Error::Config {
                message: format!("unknown log level '{}'", other),
            }),
        }
    }
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            encoder: EncoderType::Json,
            color: false,
            caller: true,
            stacktrace: false,
            timestamps: true,
            debug: false,
            sinks: Vec::new(),
            file: None,
            skip_keys: Vec::new(),
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl FlashConfig {
    /// Load configuration from a TOML file, or the defaults when it does not
    /// exist. Environment overrides are applied in both cases.
    pub async fn load(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(config_path).await?;
            toml::from_str(&content).map_err(|e| Error::Config {
                message: format!("Failed to parse logger config: {}", e),
            })?
        } else {
            Self::default()
        };

        config.load_env_overrides();
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("Failed to serialize logger config: {}", e),
        })?;

        tokio::fs::write(config_path, content).await?;
        Ok(())
    }

    /// Load environment variable overrides. Unparseable values are ignored.
    pub fn load_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("FLASH_LOG_LEVEL") {
            self.level = level.parse().unwrap_or(self.level);
        }

        if let Ok(format) = std::env::var("FLASH_LOG_FORMAT") {
            self.encoder = format.parse().unwrap_or(self.encoder);
        }

        if let Ok(debug) = std::env::var("FLASH_DEBUG") {
            self.debug = debug.parse().unwrap_or(self.debug);
        }

        if let Ok(color) = std::env::var("FLASH_LOG_COLOR") {
            self.color = color.parse().unwrap_or(self.color);
        }

        if let Ok(sinks) = std::env::var("FLASH_SINKS") {
            self.sinks = parse_list(&sinks);
        }

        if let Ok(keys) = std::env::var("FLASH_SKIP_KEYS") {
            self.skip_keys = parse_list(&keys);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for uri in &self.sinks {
            if uri.trim().is_empty() {
                return Err(Error::Config {
                    message: "sink URIs must not be empty".to_string(),
                });
            }
            if uri.contains("://") && !uri.starts_with("file://") {
                return Err(Error::Config {
                    message: format!("unsupported sink URI '{}'", uri),
                });
            }
        }

        if let Some(file) = &self.file {
            if file.path.as_os_str().is_empty() {
                return Err(Error::Config {
                    message: "file sink path must not be empty".to_string(),
                });
            }
            if file.max_files == Some(0) {
                return Err(Error::Config {
                    message: "max_files must be greater than 0".to_string(),
                });
            }
        }

        if self.skip_keys.iter().any(|key| key.is_empty()) {
            return Err(Error::Config {
                message: "skip keys must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
