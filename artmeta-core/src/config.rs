//! JSON configuration.
//!
//! ```json
//! {
//!   "LogLevel": "info",
//!   "MaxConcurrentJobs": 4,
//!   "Storage": {
//!     "Type": "b2",
//!     "Config": { "BucketName": "blog", "Region": "eu-central-003", "Prefix": "articles/",
//!                 "KeyID": "${B2_KEY_ID}", "ApplicationKey": "${B2_APPLICATION_KEY}" }
//!   }
//! }
//! ```
//!
//! `$VAR` and `${VAR}` references are expanded from the environment before
//! parsing; an undefined variable is an error. The `Storage.Type` tag selects
//! which `Config` shape is required and unknown tags are rejected.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// Root of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    #[serde(default)]
    pub log_level: LogLevel,
    pub storage: StorageConfig,
    pub max_concurrent_jobs: usize,
}

/// Type-tagged storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "Type", content = "Config")]
pub enum StorageConfig {
    #[serde(rename = "b2")]
    B2(B2Config),
    #[serde(rename = "fs")]
    Fs(FsConfig),
}

impl StorageConfig {
    /// The discriminator as written in the config file.
    pub fn type_tag(&self) -> &'static str {
        match self {
            StorageConfig::B2(_) => "b2",
            StorageConfig::Fs(_) => "fs",
        }
    }
}

/// Backblaze B2 bucket access.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct B2Config {
    pub bucket_name: String,
    pub region: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(rename = "KeyID", default)]
    pub key_id: String,
    #[serde(default)]
    pub application_key: String,
    /// Authorization base URL; defaults to the public B2 API.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl fmt::Debug for B2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("B2Config")
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .field("prefix", &self.prefix)
            .field("key_id", &self.key_id)
            .field("application_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// A local directory used as the document store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FsConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub prefix: String,
}

/// Minimum severity of emitted log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!(
                "unknown log level '{other}'; expected: trace, debug, info, warn, error"
            )),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl Config {
    /// Read, expand, parse and validate the config file at `path`.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str_at(&raw, path)
    }

    /// Parse config text; `path` is only used for error context.
    pub fn from_str_at(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let expanded = shellexpand::env(raw).map_err(|e| ConfigError::Expand {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Config =
            serde_json::from_str(&expanded).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_jobs < 1 {
            return Err("MaxConcurrentJobs must be at least 1".to_string());
        }
        match &self.storage {
            StorageConfig::B2(b2) => {
                if b2.bucket_name.is_empty() {
                    return Err("Storage.Config.BucketName must not be empty".to_string());
                }
                if b2.region.is_empty() {
                    return Err("Storage.Config.Region must not be empty".to_string());
                }
            }
            StorageConfig::Fs(fs) => {
                if fs.root.as_os_str().is_empty() {
                    return Err("Storage.Config.Root must not be empty".to_string());
                }
            }
        }
        Ok(())
    }
}
