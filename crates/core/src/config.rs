//! Configuration management
//!
//! This module handles loading, saving, and migrating the aliasman
//! configuration file. The file is TOML, stored by default at
//! `~/.config/aliasman/config.toml`. Paths of the file-based providers
//! default to siblings of the configuration file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Layout version written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// Configuration file name inside the configuration directory
pub const CONFIG_FILE: &str = "config.toml";

/// Contents of `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Layout version of this file
    pub schema_version: u32,

    /// Selected email provider
    #[serde(default)]
    pub email_type: String,

    /// Selected storage provider
    #[serde(default)]
    pub storage_type: String,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub s3: S3Config,

    #[serde(default)]
    pub files: FilesConfig,

    #[serde(default)]
    pub sqlite3: SqliteConfig,

    #[serde(default)]
    pub gsuite: GsuiteConfig,

    #[serde(default)]
    pub rackspace: RackspaceConfig,

    /// Directory the configuration was loaded from
    #[serde(skip)]
    config_dir: PathBuf,
}

/// Values used when a command does not specify them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub addresses: Vec<String>,
}

/// S3 storage provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default)]
    pub bucket: String,

    /// Custom endpoint for S3-compatible services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Metadata fetches in flight during a full scan
    #[serde(default = "default_concurrent_heads")]
    pub concurrent_heads: usize,

    /// Depth of the full-scan work queue
    #[serde(default = "default_channel_depth")]
    pub channel_depth: usize,

    /// Timeout for one metadata fetch
    #[serde(default = "default_head_timeout")]
    pub head_timeout_secs: u64,

    /// Deadline for a whole full scan, 0 for none
    #[serde(default)]
    pub scan_timeout_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_concurrent_heads() -> usize {
    25
}

fn default_channel_depth() -> usize {
    50
}

fn default_head_timeout() -> u64 {
    30
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            endpoint: None,
            concurrent_heads: default_concurrent_heads(),
            channel_depth: default_channel_depth(),
            head_timeout_secs: default_head_timeout(),
            scan_timeout_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Directory holding one JSON document per alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqliteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

/// Google Workspace Admin API settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GsuiteConfig {
    /// OAuth client credentials file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<PathBuf>,

    /// OAuth token file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<PathBuf>,

    /// Override for the Admin API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Rackspace Email API settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RackspaceConfig {
    #[serde(default)]
    pub user_key: String,

    #[serde(default)]
    pub secret_key: String,

    /// Override for the API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Minimum gap between API calls, in milliseconds
    #[serde(default = "default_throttle")]
    pub throttle_ms: u64,
}

fn default_throttle() -> u64 {
    700
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            email_type: String::new(),
            storage_type: String::new(),
            defaults: Defaults::default(),
            s3: S3Config::default(),
            files: FilesConfig::default(),
            sqlite3: SqliteConfig::default(),
            gsuite: GsuiteConfig::default(),
            rackspace: RackspaceConfig::default(),
            config_dir: PathBuf::new(),
        }
    }
}

impl Config {
    /// Directory the configuration lives in
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn set_config_dir(&mut self, dir: impl Into<PathBuf>) {
        self.config_dir = dir.into();
    }

    pub fn files_path(&self) -> PathBuf {
        self.files
            .path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("files"))
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.sqlite3
            .db_path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("aliasman.sqlite"))
    }

    pub fn gsuite_credentials_path(&self) -> PathBuf {
        self.gsuite
            .credentials
            .clone()
            .unwrap_or_else(|| self.config_dir.join("gsuite-credentials.json"))
    }

    pub fn gsuite_token_path(&self) -> PathBuf {
        self.gsuite
            .token
            .clone()
            .unwrap_or_else(|| self.config_dir.join("gsuite-token.json"))
    }
}

/// Fail with a configuration error when `value` is empty.
pub fn require<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} is not set")));
    }
    Ok(value)
}

/// Reads and writes `config.toml`
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for `<platform config dir>/aliasman/config.toml`
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        Ok(Self::in_dir(config_dir.join("aliasman")))
    }

    /// ConfigManager for `config.toml` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            config_path: dir.as_ref().join(CONFIG_FILE),
        }
    }

    /// Manager for an explicit file path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Path of the configuration file
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    fn config_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Read the configuration.
    ///
    /// A missing file yields the defaults. Older schema versions are migrated;
    /// newer ones are rejected.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            let mut config = Config::default();
            config.set_config_dir(self.config_dir());
            return Ok(config);
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade aliasman.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.set_config_dir(self.config_dir());
        Ok(config)
    }

    /// Write the configuration, creating its directory. The file holds
    /// provider credentials, so it is made owner-only (0600).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Bring an older schema up to date
    fn migrate(&self, mut config: Config) -> Result<Config> {
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}
