//! Node configuration.
//!
//! Loaded from a TOML file, overridden from the command line and validated
//! before the node starts. Every section falls back to its defaults, so a
//! config file only needs the keys it changes.

use serde::{Deserialize, Serialize};
use socprod_consensus::{NodeMode, VerificationConfig};
use socprod_core::ChainConfig;
use socprod_network::TcpConfig;
use socprod_sync::SyncConfig;
use socprod_types::MAX_ID_LEN;
use std::path::{Path, PathBuf};

/// Node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name, for logs only
    pub name: String,
    /// Data directory
    pub data_dir: PathBuf,
    /// Identity announced to peers and counted in votes
    pub node_id: String,
    /// Whether this node votes
    pub mode: NodeMode,
    /// Seconds between sweeps, fetch rounds and head announcements
    pub tick_interval_secs: u64,
    pub network: TcpConfig,
    pub chain: ChainConfig,
    pub verification: VerificationConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "socprod-node".to_string(),
            data_dir: PathBuf::from("./data"),
            node_id: format!("node-{:08x}", rand::random::<u32>()),
            mode: NodeMode::default(),
            tick_interval_secs: 5,
            network: TcpConfig::default(),
            chain: ChainConfig::default(),
            verification: VerificationConfig::default(),
            sync: SyncConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let path_str = path.to_string_lossy();
        if path_str.contains("..") {
            anyhow::bail!("Invalid path: directory traversal detected");
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: NodeConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let path_str = path.to_string_lossy();
        if path_str.contains("..") {
            anyhow::bail!("Invalid path: directory traversal detected");
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node_id.is_empty() {
            anyhow::bail!("node_id cannot be empty");
        }
        if self.node_id.len() > MAX_ID_LEN {
            anyhow::bail!("node_id is longer than {} bytes", MAX_ID_LEN);
        }
        if self.tick_interval_secs == 0 {
            anyhow::bail!("tick_interval_secs must be positive");
        }

        if self.chain.block_batch_size == 0 {
            anyhow::bail!("chain.block_batch_size must be positive");
        }
        if self.chain.block_batch_size > self.chain.max_block_transactions {
            anyhow::bail!(
                "chain.block_batch_size ({}) exceeds chain.max_block_transactions ({})",
                self.chain.block_batch_size,
                self.chain.max_block_transactions
            );
        }

        if self.network.max_peers == 0 {
            anyhow::bail!("network.max_peers must be positive");
        }

        self.verification.validate()?;
        self.sync.validate()?;

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            other => anyhow::bail!("Unknown log format '{}'", other),
        }

        Ok(())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Keep the chain in memory only; nothing survives a restart
    pub in_memory: bool,
    /// Database directory, relative to `data_dir` unless absolute
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            db_path: PathBuf::from("db"),
        }
    }
}

impl StorageConfig {
    pub fn resolve(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.db_path)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive
    pub level: String,
    /// Log to file
    pub log_file: Option<PathBuf>,
    /// Log format (json|pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn json(&self) -> bool {
        self.format == "json"
    }
}
