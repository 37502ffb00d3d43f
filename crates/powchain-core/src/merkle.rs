//! Merkle root commitment over an ordered list of transaction ids.

use crate::error::ArgumentError;
use crate::hash::{double_sha256, hash_from_slice, Hash256, TxId};

/// Compute the merkle root from a list of transaction IDs.
///
/// A single transaction is its own root, with no hashing applied.
///
/// For multiple transactions, each level hashes `left || right` pairs with
/// double SHA256. A level with an odd count pairs its last id with itself.
pub fn compute_merkle_root(txids: &[TxId]) -> Result<Hash256, ArgumentError> {
    if txids.is_empty() {
        return Err(ArgumentError::EmptyTransactions);
    }

    if txids.len() == 1 {
        return Ok(txids[0]);
    }

    let mut current_level: Vec<Hash256> = txids.to_vec();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity((current_level.len() + 1) / 2);

        for pair in current_level.chunks(2) {
            let left = pair[0];
            let right = pair.get(1).copied().unwrap_or(left);
            next_level.push(hash_pair(&left, &right));
        }

        current_level = next_level;
    }

    Ok(current_level[0])
}

/// Compute the merkle root from untrusted byte buffers.
///
/// Every buffer must be exactly 32 bytes.
pub fn merkle_root_from_slices<T: AsRef<[u8]>>(txids: &[T]) -> Result<Hash256, ArgumentError> {
    compute_merkle_root(&txids_from_slices(txids)?)
}

/// Convert byte buffers into fixed-size transaction ids.
pub fn txids_from_slices<T: AsRef<[u8]>>(txids: &[T]) -> Result<Vec<TxId>, ArgumentError> {
    if txids.is_empty() {
        return Err(ArgumentError::EmptyTransactions);
    }
    txids
        .iter()
        .map(|txid| hash_from_slice(txid.as_ref(), "txid"))
        .collect()
}

fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    double_sha256(&combined)
}
