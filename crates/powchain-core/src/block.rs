//! Block header construction and serialization, and blocks that commit to
//! their transactions through the header's merkle root.

use crate::error::ArgumentError;
use crate::hash::{double_sha256, hash_from_slice, Hash256, TxId};
use crate::merkle::compute_merkle_root;

/// Serialized header size in bytes.
pub const HEADER_SIZE: usize = 84;

/// Version stamped on newly built headers.
pub const CURRENT_VERSION: u32 = 1;

/// A block header (84 bytes on the wire).
///
/// Fields are private so every value passes through a validating setter;
/// a header that exists is always serializable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    version: u32,
    prev_block_hash: Hash256,
    merkle_root: Hash256,
    timestamp: u64,
    bits: u32,
    nonce: u32,
}

impl BlockHeader {
    /// Create a new block header with a zero nonce.
    pub fn new(
        version: u32,
        prev_block_hash: Hash256,
        merkle_root: Hash256,
        timestamp: u64,
        bits: u32,
    ) -> Result<Self, ArgumentError> {
        validate_version(version)?;
        validate_bits(bits)?;
        Ok(BlockHeader {
            version,
            prev_block_hash,
            merkle_root,
            timestamp,
            bits,
            nonce: 0,
        })
    }

    /// Parse an 84-byte serialized header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArgumentError> {
        if bytes.len() != HEADER_SIZE {
            return Err(ArgumentError::InvalidLength {
                field: "header",
                expected: HEADER_SIZE,
                got: bytes.len(),
            });
        }

        let version = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let prev_block_hash = hash_from_slice(&bytes[4..36], "prev_block_hash")?;
        let merkle_root = hash_from_slice(&bytes[36..68], "merkle_root")?;
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&bytes[68..76]);
        let bits = u32::from_be_bytes([bytes[76], bytes[77], bytes[78], bytes[79]]);
        let nonce = u32::from_be_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]);

        let mut header = BlockHeader::new(
            version,
            prev_block_hash,
            merkle_root,
            u64::from_be_bytes(timestamp),
            bits,
        )?;
        header.nonce = nonce;
        Ok(header)
    }

    /// Serialize the block header to 84 bytes, all integers big-endian.
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[..80].copy_from_slice(&self.serialize_without_nonce());
        header[80..84].copy_from_slice(&self.nonce.to_be_bytes());
        header
    }

    /// Serialize the header without the nonce (80 bytes).
    /// Used for efficient mining where only the nonce changes per attempt.
    pub fn serialize_without_nonce(&self) -> [u8; 80] {
        let mut header = [0u8; 80];

        // Version (4 bytes)
        header[0..4].copy_from_slice(&self.version.to_be_bytes());

        // Previous block hash (32 bytes)
        header[4..36].copy_from_slice(&self.prev_block_hash);

        // Merkle root (32 bytes)
        header[36..68].copy_from_slice(&self.merkle_root);

        // Timestamp (8 bytes)
        header[68..76].copy_from_slice(&self.timestamp.to_be_bytes());

        // Bits (4 bytes)
        header[76..80].copy_from_slice(&self.bits.to_be_bytes());

        header
    }

    /// Compute the block hash (double SHA256 of the serialized header).
    pub fn hash(&self) -> Hash256 {
        double_sha256(&self.serialize())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn prev_block_hash(&self) -> Hash256 {
        self.prev_block_hash
    }

    pub fn merkle_root(&self) -> Hash256 {
        self.merkle_root
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn set_version(&mut self, version: u32) -> Result<(), ArgumentError> {
        validate_version(version)?;
        self.version = version;
        Ok(())
    }

    pub fn set_prev_block_hash(&mut self, prev_block_hash: Hash256) {
        self.prev_block_hash = prev_block_hash;
    }

    pub fn set_merkle_root(&mut self, merkle_root: Hash256) {
        self.merkle_root = merkle_root;
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn set_bits(&mut self, bits: u32) -> Result<(), ArgumentError> {
        validate_bits(bits)?;
        self.bits = bits;
        Ok(())
    }

    pub fn set_nonce(&mut self, nonce: u32) {
        self.nonce = nonce;
    }
}

fn validate_version(version: u32) -> Result<(), ArgumentError> {
    if version < 1 {
        return Err(ArgumentError::InvalidVersion(version));
    }
    Ok(())
}

fn validate_bits(bits: u32) -> Result<(), ArgumentError> {
    if bits == 0 {
        return Err(ArgumentError::ZeroBits);
    }
    Ok(())
}

/// Get the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A header plus the ordered, non-empty transaction ids it commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<TxId>,
}

impl Block {
    /// Create a block. The header's merkle root is left as given; call
    /// [`Block::compute_and_set_merkle_root`] to derive it.
    pub fn new(header: BlockHeader, transactions: Vec<TxId>) -> Result<Self, ArgumentError> {
        if transactions.is_empty() {
            return Err(ArgumentError::EmptyTransactions);
        }
        Ok(Block {
            header,
            transactions,
        })
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Exclusive access to the header, e.g. for a nonce search.
    ///
    /// The borrow ends when the caller is done; nothing else can observe the
    /// header while it is held.
    pub fn header_mut(&mut self) -> &mut BlockHeader {
        &mut self.header
    }

    pub fn transactions(&self) -> &[TxId] {
        &self.transactions
    }

    /// Replace the transaction list. The merkle root is not updated.
    pub fn set_transactions(&mut self, transactions: Vec<TxId>) -> Result<(), ArgumentError> {
        if transactions.is_empty() {
            return Err(ArgumentError::EmptyTransactions);
        }
        self.transactions = transactions;
        Ok(())
    }

    /// Derive the merkle root from the transactions and store it in the header.
    pub fn compute_and_set_merkle_root(&mut self) -> Result<Hash256, ArgumentError> {
        let root = compute_merkle_root(&self.transactions)?;
        self.header.set_merkle_root(root);
        Ok(root)
    }

    /// Check that the stored merkle root matches the transactions.
    ///
    /// Never fails; returns `false` on any inconsistency. Difficulty is not
    /// checked here. Id and hash lengths are fixed by their types.
    pub fn verify(&self) -> bool {
        match compute_merkle_root(&self.transactions) {
            Ok(root) => root == self.header.merkle_root,
            Err(_) => false,
        }
    }

    /// The header hash. Performs no difficulty check.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }
}
