/*!
 * Configuration structures and defaults for blocksync
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BlockSyncError, Result};

/// Strong hash algorithm used to confirm a candidate weak-hash match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3 (fast, secure, default)
    Blake3,
    /// SHA-256
    Sha256,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Blake3
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blake3 => write!(f, "blake3"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            _ => Err(format!("unknown hash algorithm: {}", s)),
        }
    }
}

/// Log verbosity, mirrored onto a `tracing::Level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Process-wide sync configuration. The only field that affects wire
/// compatibility is `block_size` — it must match on both peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Block size `B` used by both the destination scan and the source scan.
    pub block_size: usize,

    /// Strong hash algorithm used to confirm weak-hash matches.
    pub hash_algorithm: HashAlgorithm,

    /// Maximum bytes carried by a single INSERT instruction before the
    /// literal buffer is flushed early. Purely a memory-per-frame cap; does
    /// not affect correctness.
    pub max_insert_chunk: usize,

    /// Address the server binds to.
    pub bind_addr: String,

    /// Per-read timeout for socket operations. `None` disables the timeout.
    pub read_timeout: Option<Duration>,

    /// Logging verbosity.
    pub log_level: LogLevel,

    /// Optional path to a log file. When unset, logs go to stdout.
    pub log_file: Option<PathBuf>,
}

/// Default block size, per §6 of the protocol: 4096 bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Default cap on a single INSERT instruction's payload: 64 KiB.
pub const DEFAULT_MAX_INSERT_CHUNK: usize = 64 * 1024;

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            hash_algorithm: HashAlgorithm::Blake3,
            max_insert_chunk: DEFAULT_MAX_INSERT_CHUNK,
            bind_addr: "0.0.0.0:9031".to_string(),
            read_timeout: None,
            log_level: LogLevel::Info,
            log_file: None,
        }
    }
}

impl SyncConfig {
    /// Validate invariants that the core relies on (§3, §4.3: `B = 0` is
    /// rejected at construction).
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(BlockSyncError::InvalidArgument(
                "block_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_hash_algorithm(mut self, algo: HashAlgorithm) -> Self {
        self.hash_algorithm = algo;
        self
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

/// On-disk configuration file, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: ConfigDefaults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub block_size: Option<usize>,
    pub hash_algorithm: Option<String>,
    pub max_insert_chunk: Option<usize>,
    pub bind_addr: Option<String>,
    pub log_level: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BlockSyncError::InvalidArgument(format!("failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| BlockSyncError::InvalidArgument(format!("failed to parse config file: {}", e)))
    }

    /// Load configuration with fallback priority:
    /// 1. `./blocksync.toml` (project-specific)
    /// 2. `~/.blocksync/blocksync.toml` (user defaults)
    /// 3. Built-in defaults
    pub fn load_with_fallback() -> Self {
        if let Ok(config) = Self::load(Path::new("blocksync.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".blocksync").join("blocksync.toml");
            if let Ok(config) = Self::load(&user_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Apply this config file's overrides onto a `SyncConfig`.
    pub fn apply_to(&self, config: &mut SyncConfig) {
        if let Some(block_size) = self.defaults.block_size {
            config.block_size = block_size;
        }

        if let Some(ref algo) = self.defaults.hash_algorithm {
            if let Ok(parsed) = algo.parse() {
                config.hash_algorithm = parsed;
            }
        }

        if let Some(max_insert_chunk) = self.defaults.max_insert_chunk {
            config.max_insert_chunk = max_insert_chunk;
        }

        if let Some(ref bind_addr) = self.defaults.bind_addr {
            config.bind_addr = bind_addr.clone();
        }

        if let Some(ref level) = self.defaults.log_level {
            match level.to_lowercase().as_str() {
                "error" => config.log_level = LogLevel::Error,
                "warn" => config.log_level = LogLevel::Warn,
                "info" => config.log_level = LogLevel::Info,
                "debug" => config.log_level = LogLevel::Debug,
                "trace" => config.log_level = LogLevel::Trace,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Blake3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let config = SyncConfig::default().with_block_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hash_algorithm_parsing() {
        assert_eq!("blake3".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
        assert_eq!("sha256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_config_file_apply_to() {
        let file = ConfigFile {
            defaults: ConfigDefaults {
                block_size: Some(8192),
                hash_algorithm: Some("sha256".to_string()),
                max_insert_chunk: None,
                bind_addr: None,
                log_level: Some("debug".to_string()),
            },
        };

        let mut config = SyncConfig::default();
        file.apply_to(&mut config);

        assert_eq!(config.block_size, 8192);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.log_level, LogLevel::Debug);
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
