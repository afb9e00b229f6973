use serde::Deserialize;
use std::path::PathBuf;
use crate::error::{CaskError, Result};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Storage parameters for the segmented log.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding the segment files.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Segment size threshold in bytes. Once the current segment's write
    /// position reaches this value after an append, a new segment is opened.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Sync data to disk after every append. Off by default: the OS decides
    /// when buffered writes reach the platter.
    #[serde(default)]
    pub sync_on_write: bool,
    /// Expected number of distinct keys, used to size the membership filter.
    #[serde(default = "default_filter_capacity")]
    pub filter_capacity: usize,
    /// Target false-positive rate of the membership filter.
    #[serde(default = "default_filter_fp_rate")]
    pub filter_fp_rate: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            max_file_size: default_max_file_size(),
            sync_on_write: false,
            filter_capacity: default_filter_capacity(),
            filter_fp_rate: default_filter_fp_rate(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { storage: StorageConfig::default() }
    }
}

fn default_dir() -> PathBuf { PathBuf::from("./caskdb-data") }
fn default_max_file_size() -> u64 { 1024 * 1024 * 1024 }
fn default_filter_capacity() -> usize { 1 << 20 }
fn default_filter_fp_rate() -> f64 { 0.01 }

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CaskError::Config(format!("Cannot read config file: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CaskError::Config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.max_file_size == 0 {
            return Err(CaskError::Config("max_file_size must be > 0".into()));
        }
        if self.storage.filter_capacity == 0 {
            return Err(CaskError::Config("filter_capacity must be > 0".into()));
        }
        if !(self.storage.filter_fp_rate > 0.0 && self.storage.filter_fp_rate < 1.0) {
            return Err(CaskError::Config("filter_fp_rate must be in (0, 1)".into()));
        }
        Ok(())
    }
}
