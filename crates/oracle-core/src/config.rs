//! Configuration for the oracle client.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $ORACLE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/oracle/config.toml
//!   3. ~/.config/oracle/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{TaskParameters, DEFAULT_PROTOCOL};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub chain: ChainConfig,
    pub storage: StorageConfig,
    pub task: TaskSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Coordinator contract, `0x` hex.
    pub coordinator_address: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Everything inline, no overflow.
    None,
    Memory,
    #[default]
    Arweave,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "memory" => Ok(Self::Memory),
            "arweave" => Ok(Self::Arweave),
            other => Err(format!("unknown storage backend {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Payloads longer than this many bytes overflow to the backend.
    pub bytes_limit: usize,
    pub gateway_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub protocol: String,
    pub parameters: TaskParameters,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://base-sepolia-rpc.publicnode.com".to_string(),
            coordinator_address: "0x13f977bde221b470d3ae055cde7e1f84debfe202".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            bytes_limit: 1024,
            gateway_url: "https://gateway.irys.xyz".to_string(),
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            protocol: DEFAULT_PROTOCOL.to_string(),
            parameters: TaskParameters::default(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("oracle")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl OracleConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            OracleConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse one TOML file, no env overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("ORACLE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = OracleConfig::default().to_toml()?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    /// Apply ORACLE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any lookup. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ORACLE_CHAIN__RPC_URL") {
            self.chain.rpc_url = v;
        }
        if let Some(v) = lookup("ORACLE_CHAIN__COORDINATOR_ADDRESS") {
            self.chain.coordinator_address = v;
        }
        if let Some(v) = lookup("ORACLE_STORAGE__BACKEND") {
            if let Ok(kind) = v.parse() {
                self.storage.backend = kind;
            }
        }
        if let Some(v) = lookup("ORACLE_STORAGE__BYTES_LIMIT") {
            if let Ok(n) = v.parse() {
                self.storage.bytes_limit = n;
            }
        }
        if let Some(v) = lookup("ORACLE_STORAGE__GATEWAY_URL") {
            self.storage.gateway_url = v;
        }
        if let Some(v) = lookup("ORACLE_TASK__PROTOCOL") {
            self.task.protocol = v;
        }
    }
}
