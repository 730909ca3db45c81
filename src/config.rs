//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Reconciliation loop configuration
    pub reconciler: ReconcilerConfig,

    /// Notification configuration
    pub notify: NotifyConfig,

    /// Bed temperature source
    pub probe: ProbeConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub channel_buffer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeSource {
    /// Follow M140/M190 in the command stream
    Stream,
    /// Read the target from `probe.file`
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub source: ProbeSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    pub log_directory: PathBuf,
}

impl PathsConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

impl ReconcilerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "WARN".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
            },
            reconciler: ReconcilerConfig {
                tick_interval_ms: 1000,
            },
            notify: NotifyConfig { channel_buffer: 64 },
            probe: ProbeConfig {
                source: ProbeSource::Stream,
                file: None,
            },
            paths: PathsConfig {
                data_dir: dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("bed-usage"),
                database_file: "bedusage.db".to_string(),
                log_directory: PathBuf::from("logs"),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("bed-usage.toml"),
            PathBuf::from(".bed-usage.toml"),
            dirs::config_dir()
                .map(|d| d.join("bed-usage").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        if let Ok(val) = env::var("BED_USAGE_TICK_INTERVAL_MS") {
            self.reconciler.tick_interval_ms = val
                .parse()
                .context("Invalid BED_USAGE_TICK_INTERVAL_MS")?;
        }
        if let Ok(val) = env::var("BED_USAGE_NOTIFY_BUFFER") {
            self.notify.channel_buffer = val.parse().context("Invalid BED_USAGE_NOTIFY_BUFFER")?;
        }

        // Probe overrides
        if let Ok(val) = env::var("BED_USAGE_PROBE_SOURCE") {
            self.probe.source = match val.to_ascii_lowercase().as_str() {
                "stream" => ProbeSource::Stream,
                "file" => ProbeSource::File,
                other => anyhow::bail!("Invalid BED_USAGE_PROBE_SOURCE: {}", other),
            };
        }
        if let Ok(val) = env::var("BED_USAGE_PROBE_FILE") {
            self.probe.file = Some(PathBuf::from(val));
        }

        // Path overrides
        if let Ok(val) = env::var("BED_USAGE_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("BED_USAGE_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!(
                "Log format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            ));
        }

        if !matches!(self.logging.output.as_str(), "console" | "file" | "both") {
            return Err(anyhow::anyhow!(
                "Log output must be 'console', 'file' or 'both', got '{}'",
                self.logging.output
            ));
        }

        if self.reconciler.tick_interval_ms == 0 || self.reconciler.tick_interval_ms > 60_000 {
            return Err(anyhow::anyhow!(
                "Tick interval must be between 1ms and 60000ms, got {}ms",
                self.reconciler.tick_interval_ms
            ));
        }

        if self.reconciler.tick_interval_ms > 10_000 {
            warn!(
                tick_interval_ms = self.reconciler.tick_interval_ms,
                "Long tick interval delays notifications and persistence"
            );
        }

        if self.notify.channel_buffer == 0 {
            return Err(anyhow::anyhow!("Notification channel buffer must be greater than 0"));
        }

        if self.probe.source == ProbeSource::File && self.probe.file.is_none() {
            return Err(anyhow::anyhow!("Probe source 'file' requires probe.file to be set"));
        }

        if self.paths.database_file.trim().is_empty() {
            return Err(anyhow::anyhow!("Database file name cannot be empty"));
        }

        // Create the log directory only when something will be written to it
        if self.logging.output != "console" && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Install a configuration before first use. Returns false if one was already set.
pub fn init_config(config: Config) -> bool {
    CONFIG.set(config).is_ok()
}

/// Get the global configuration instance
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load().unwrap_or_else(|e| {
            eprintln!("Failed to load configuration, using defaults: {:#}", e);
            Config::default()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "WARN");
        assert_eq!(config.reconciler.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.probe.source, ProbeSource::Stream);
        assert!(config.paths.database_path().ends_with("bedusage.db"));
    }

    #[test]
    fn test_env_override() {
        env::set_var("BED_USAGE_NOTIFY_BUFFER", "16");
        let mut config = Config::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.notify.channel_buffer, 16);
        env::remove_var("BED_USAGE_NOTIFY_BUFFER");
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.reconciler.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.probe.source = ProbeSource::File;
        assert!(config.validate().is_err());
    }
}
