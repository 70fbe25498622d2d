//! Configuration resolution for RelayKey.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/relaykey/settings.json)
//! 3. Project config (.relaykey/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Complete RelayKey configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub keychain: KeychainConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which persistence backend holds the keychain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, lost on exit.
    Memory,
    /// Single JSON file.
    #[default]
    File,
    /// `SQLite` database.
    Sqlite,
}

impl StoreBackend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!("Unknown keychain backend: {other}"))),
        }
    }
}

/// Keychain persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct KeychainConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Explicit storage location. `None` resolves to the platform default
    /// for the selected backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl KeychainConfig {
    /// Storage location for the configured backend, falling back to the
    /// platform default. Always `None` for the memory backend.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        match self.backend {
            StoreBackend::Memory => None,
            StoreBackend::File => self
                .path
                .clone()
                .or_else(|| data_dir().map(|d| d.join("keychain.json"))),
            StoreBackend::Sqlite => self
                .path
                .clone()
                .or_else(|| data_dir().map(|d| d.join("keychain.db"))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// One settings file. Only the fields a file actually sets override the
/// layer below it.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
struct ConfigLayer {
    #[serde(default)]
    keychain: KeychainLayer,
    #[serde(default)]
    logging: LoggingLayer,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
struct KeychainLayer {
    backend: Option<StoreBackend>,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
struct LoggingLayer {
    level: Option<String>,
    json: Option<bool>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    resolve_config(global_config_path().as_deref(), project_dir, |key| {
        std::env::var(key).ok()
    })
}

fn resolve_config<F>(
    global_path: Option<&Path>,
    project_dir: Option<&Path>,
    lookup: F,
) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();

    if let Some(path) = global_path.filter(|p| p.exists()) {
        merge_config(&mut config, load_config_file(path)?);
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".relaykey").join("settings.json");
        if project_path.exists() {
            merge_config(&mut config, load_config_file(&project_path)?);
        }
    }

    apply_env_overrides(&mut config, lookup);
    Ok(config)
}

/// Directory holding RelayKey's config and default keychain files.
pub fn data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".relaykey"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/relaykey"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("relaykey"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<ConfigLayer> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, layer: ConfigLayer) {
    if let Some(backend) = layer.keychain.backend {
        base.keychain.backend = backend;
    }
    if let Some(path) = layer.keychain.path {
        base.keychain.path = Some(path);
    }
    if let Some(level) = layer.logging.level {
        base.logging.level = level;
    }
    if let Some(json) = layer.logging.json {
        base.logging.json = json;
    }
}

/// Apply `RELAYKEY_*` overrides. `lookup` abstracts the environment so the
/// precedence rules can be exercised without mutating process state.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("RELAYKEY_KEYCHAIN_BACKEND") {
        if let Ok(backend) = val.parse() {
            config.keychain.backend = backend;
        }
    }
    if let Some(val) = lookup("RELAYKEY_KEYCHAIN_PATH") {
        if !val.is_empty() {
            config.keychain.path = Some(PathBuf::from(val));
        }
    }
    if let Some(val) = lookup("RELAYKEY_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = lookup("RELAYKEY_LOG_JSON") {
        if let Ok(json) = val.parse() {
            config.logging.json = json;
        }
    }
}
