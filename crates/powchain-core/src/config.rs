//! Chain and miner settings.
//!
//! Nothing here is read from disk or the environment; callers build the
//! structs directly or deserialize them from whatever format they use.

use serde::{Deserialize, Serialize};

use crate::block::CURRENT_VERSION;
use crate::difficulty::DifficultyPolicy;
use crate::error::ArgumentError;

/// Attempts between timestamp refreshes and between progress reports.
pub const DEFAULT_MINER_INTERVAL: u64 = 1 << 20;

/// Tunable cadence of the nonce search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Attempts between refreshes of the header timestamp.
    pub timestamp_refresh_interval: u64,
    /// Attempts between progress events.
    pub telemetry_interval: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            timestamp_refresh_interval: DEFAULT_MINER_INTERVAL,
            telemetry_interval: DEFAULT_MINER_INTERVAL,
        }
    }
}

impl MinerConfig {
    pub fn validate(&self) -> Result<(), ArgumentError> {
        if self.timestamp_refresh_interval == 0 {
            return Err(ArgumentError::ZeroInterval("timestamp_refresh_interval"));
        }
        if self.telemetry_interval == 0 {
            return Err(ArgumentError::ZeroInterval("telemetry_interval"));
        }
        Ok(())
    }
}

/// Everything a [`Chain`](crate::chain::Chain) needs to build and check blocks.
///
/// The difficulty policy has no default: every chain names the one it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub policy: DifficultyPolicy,
    /// Difficulty parameter stamped on every block, read under `policy`.
    pub bits: u32,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub miner: MinerConfig,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl ChainConfig {
    pub fn new(policy: DifficultyPolicy, bits: u32) -> Self {
        ChainConfig {
            policy,
            bits,
            version: CURRENT_VERSION,
            miner: MinerConfig::default(),
        }
    }

    /// Require `zeros` leading zero hex nibbles on every block hash.
    pub fn hex_prefix(zeros: u32) -> Self {
        ChainConfig::new(DifficultyPolicy::HexPrefix, zeros)
    }

    /// Require every block hash to be at most the compact target `n_bits`.
    pub fn compact(n_bits: u32) -> Self {
        ChainConfig::new(DifficultyPolicy::CompactTarget, n_bits)
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_miner(mut self, miner: MinerConfig) -> Self {
        self.miner = miner;
        self
    }

    pub fn validate(&self) -> Result<(), ArgumentError> {
        if self.version < 1 {
            return Err(ArgumentError::InvalidVersion(self.version));
        }
        if self.bits == 0 {
            return Err(ArgumentError::ZeroBits);
        }
        self.policy.validate_bits(self.bits)?;
        self.miner.validate()
    }
}
