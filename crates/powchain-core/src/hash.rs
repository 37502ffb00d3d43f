//! SHA256 double-hashing and fixed-size hash helpers.
//!
//! Every function here is pure: each call builds its own digest state, so the
//! helpers can be called from any number of threads without coordination.

use sha2::{Digest, Sha256};

use crate::error::ArgumentError;

/// Size in bytes of every hash and transaction id.
pub const HASH_SIZE: usize = 32;

/// A 32-byte digest, compared and copied by value.
pub type Hash256 = [u8; HASH_SIZE];

/// An opaque 32-byte transaction identifier.
pub type TxId = [u8; HASH_SIZE];

/// The all-zero hash used as the genesis block's previous hash.
pub const ZERO_HASH: Hash256 = [0u8; HASH_SIZE];

/// Double SHA256: SHA256(SHA256(data)).
///
/// This is used for header hashing and merkle tree nodes.
#[inline]
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(&first);
    let mut result = [0u8; HASH_SIZE];
    result.copy_from_slice(&second);
    result
}

/// Single SHA256 hash.
#[inline]
pub fn sha256(data: &[u8]) -> Hash256 {
    let hash = Sha256::digest(data);
    let mut result = [0u8; HASH_SIZE];
    result.copy_from_slice(&hash);
    result
}

/// Copy a byte slice into a fixed-size hash, rejecting any other length.
///
/// `field` names the value in the error so callers can tell which input was
/// malformed.
pub fn hash_from_slice(bytes: &[u8], field: &'static str) -> Result<Hash256, ArgumentError> {
    bytes.try_into().map_err(|_| ArgumentError::InvalidLength {
        field,
        expected: HASH_SIZE,
        got: bytes.len(),
    })
}

/// Lowercase hex, two characters per byte, no separators.
pub fn to_hex(hash: &Hash256) -> String {
    hex::encode(hash)
}

/// Count leading zero hex nibbles, reading the hash from its first byte.
pub fn leading_zero_nibbles(hash: &Hash256) -> u32 {
    let mut zeros = 0u32;
    for byte in hash {
        if *byte == 0 {
            zeros += 2;
        } else {
            if byte >> 4 == 0 {
                zeros += 1;
            }
            break;
        }
    }
    zeros
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_sha256() {
        // Test vector: SHA256d("hello")
        let hash = double_sha256(b"hello");
        let expected =
            hex::decode("9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50")
                .unwrap();

        assert_eq!(hash.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_sha256() {
        let hash = sha256(b"abc");
        assert_eq!(
            to_hex(&hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_double_is_sha_of_sha() {
        let data = b"tx1";
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn test_hash_from_slice() {
        let bytes = [0xABu8; 32];
        assert_eq!(hash_from_slice(&bytes, "txid").unwrap(), bytes);

        let err = hash_from_slice(&bytes[..31], "txid").unwrap_err();
        assert_eq!(
            err,
            ArgumentError::InvalidLength {
                field: "txid",
                expected: 32,
                got: 31,
            }
        );
        assert!(hash_from_slice(&[0u8; 33], "txid").is_err());
    }

    #[test]
    fn test_to_hex_is_lowercase_unreversed() {
        let mut hash = [0u8; 32];
        hash[0] = 0xAB;
        hash[31] = 0x01;
        let text = to_hex(&hash);
        assert_eq!(text.len(), 64);
        assert!(text.starts_with("ab00"));
        assert!(text.ends_with("0001"));
    }

    #[test]
    fn test_leading_zero_nibbles() {
        assert_eq!(leading_zero_nibbles(&[0u8; 32]), 64);

        let mut hash = [0xFFu8; 32];
        assert_eq!(leading_zero_nibbles(&hash), 0);

        hash[0] = 0x00;
        hash[1] = 0x0F;
        assert_eq!(leading_zero_nibbles(&hash), 3);

        hash[1] = 0x10;
        assert_eq!(leading_zero_nibbles(&hash), 2);
    }
}
