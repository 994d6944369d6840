use crate::error::SyncError;
use serde::{Deserialize, Serialize};

/// How much finalized history a node materializes locally. Headers are
/// always synced; the strategy only decides which bodies are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Every finalized body, oldest first.
    #[default]
    Full,
    /// Only bodies that were explicitly requested.
    OnDemand,
    /// Bodies of blocks with a timestamp in `from..=to`, oldest first.
    TimeRange { from: u64, to: u64 },
    /// Newest bodies first until either ceiling is reached.
    SizeLimit { max_blocks: u64, max_bytes: u64 },
}

impl SyncStrategy {
    pub fn validate(&self) -> Result<(), SyncError> {
        match *self {
            SyncStrategy::TimeRange { from, to } if from > to => {
                Err(SyncError::InvalidTimeRange { from, to })
            }
            _ => Ok(()),
        }
    }
}

/// Sync engine parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub strategy: SyncStrategy,
    /// Seconds before an unanswered request counts as a failure
    pub request_timeout_secs: u64,
    /// Consecutive failures before a peer is reported unresponsive
    pub max_fetch_failures: u32,
    pub max_headers_per_request: u64,
    pub max_blocks_per_request: usize,
    /// Heights below the local head re-requested to find a fork point
    pub fork_lookback: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: SyncStrategy::Full,
            request_timeout_secs: 30,
            max_fetch_failures: 3,
            max_headers_per_request: 128,
            max_blocks_per_request: 16,
            fork_lookback: 8,
        }
    }
}

impl SyncConfig {
    pub fn with_strategy(strategy: SyncStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        self.strategy.validate()?;
        if self.max_headers_per_request == 0 || self.max_blocks_per_request == 0 {
            return Err(SyncError::InvalidConfig(
                "request sizes must be positive".into(),
            ));
        }
        if self.max_fetch_failures == 0 {
            return Err(SyncError::InvalidConfig(
                "max_fetch_failures must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
