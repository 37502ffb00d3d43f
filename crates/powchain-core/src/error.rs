//! Error types for headers, blocks, difficulty and the chain.
use thiserror::Error;

/// Malformed input rejected at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("transaction list is empty")]
    EmptyTransactions,
    #[error("{field} must be {expected} bytes, got {got}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("version must be >= 1, got {0}")]
    InvalidVersion(u32),
    #[error("bits must be positive")]
    ZeroBits,
    #[error("hex prefix length must be in 1..=64, got {0}")]
    HexZerosOutOfRange(u32),
    #[error("invalid compact target {0:#010x}: sign bit set")]
    CompactNegative(u32),
    #[error("invalid compact target {0:#010x}: mantissa is zero")]
    CompactZeroMantissa(u32),
    #[error("invalid compact target {0:#010x}: decodes to zero")]
    CompactZeroTarget(u32),
    #[error("attempt limit must be > 0")]
    ZeroAttemptLimit,
    #[error("{0} must be > 0")]
    ZeroInterval(&'static str),
}

/// Operation not allowed in the chain's current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("genesis block already created")]
    GenesisExists,
    #[error("no genesis block: create genesis first")]
    NoGenesis,
}

/// A block failed Merkle, proof-of-work or linkage checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("merkle root does not match transactions")]
    MerkleMismatch,
    #[error("block hash does not satisfy difficulty")]
    ProofOfWork,
    #[error("broken hash link at height {height}")]
    BrokenLink { height: u64 },
    #[error("previous hash changed during mining")]
    PrevHashChanged,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("nonce search ended without a solution after {attempts} attempts")]
    SearchExhausted { attempts: u64 },
}
