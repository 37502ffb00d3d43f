//! Proof-of-work block commitment engine.
//!
//! This crate provides:
//! - SHA256 double-hashing
//! - Merkle roots over opaque 32-byte transaction ids
//! - An 84-byte block header with big-endian serialization
//! - Two explicit difficulty policies: hex-prefix and compact target
//! - A bounded or unbounded nonce search
//! - An append-only chain that mines, links and re-validates blocks
//!
//! Logging goes through `tracing`; install a subscriber to see it.

pub mod block;
pub mod chain;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod miner;

pub use block::{Block, BlockHeader, CURRENT_VERSION, HEADER_SIZE};
pub use chain::{validate_blocks, verify_blocks, Chain};
pub use config::{ChainConfig, MinerConfig};
pub use difficulty::{compact_to_target, meets_compact_target, meets_hex_prefix, DifficultyPolicy};
pub use error::{ArgumentError, ChainError, StateError, VerificationError};
pub use hash::{double_sha256, Hash256, TxId, ZERO_HASH};
pub use merkle::compute_merkle_root;
pub use miner::{Miner, MinerState, MiningLimits, MiningOutcome, MiningStats};
