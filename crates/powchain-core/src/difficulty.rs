//! Proof-of-work acceptance predicates.
//!
//! The header's `bits` field has two incompatible meanings:
//!
//! - [`DifficultyPolicy::HexPrefix`]: the number of leading hex nibbles of the
//!   hash that must be zero.
//! - [`DifficultyPolicy::CompactTarget`]: a compact target
//!   `[exponent (1 byte)][mantissa (3 bytes)]`, where bit 23 of the mantissa is
//!   a sign flag that must be clear. The hash, read as a big-endian unsigned
//!   integer, must be at most `mantissa * 256^(exponent - 3)`.
//!
//! The policy is never inferred from the value; callers pick one explicitly.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::ArgumentError;
use crate::hash::{Hash256, HASH_SIZE};

/// Largest prefix length a 32-byte hash can satisfy.
pub const MAX_HEX_ZEROS: u32 = (HASH_SIZE * 2) as u32;

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007F_FFFF;

/// Which interpretation of `bits` a chain or mining session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyPolicy {
    /// `bits` counts required leading zero hex nibbles.
    HexPrefix,
    /// `bits` is a compact-encoded 256-bit target.
    CompactTarget,
}

impl DifficultyPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            DifficultyPolicy::HexPrefix => "hex_prefix",
            DifficultyPolicy::CompactTarget => "compact_target",
        }
    }

    /// Reject `bits` values that are meaningless under this policy.
    ///
    /// A compact target that decodes to zero is rejected here, since no hash
    /// could ever be mined against it.
    pub fn validate_bits(&self, bits: u32) -> Result<(), ArgumentError> {
        self.prepare(bits).map(|_| ())
    }

    /// Check a hash against `bits` under this policy.
    pub fn accepts(&self, hash: &Hash256, bits: u32) -> Result<bool, ArgumentError> {
        match self {
            DifficultyPolicy::HexPrefix => meets_hex_prefix(hash, bits),
            DifficultyPolicy::CompactTarget => meets_compact_target(hash, bits),
        }
    }

    /// Decode `bits` once into a reusable predicate.
    pub fn prepare(&self, bits: u32) -> Result<Difficulty, ArgumentError> {
        match self {
            DifficultyPolicy::HexPrefix => {
                check_hex_zeros(bits)?;
                Ok(Difficulty::HexPrefix { zeros: bits })
            }
            DifficultyPolicy::CompactTarget => {
                let target = compact_to_target(bits)?;
                if target == BigUint::default() {
                    return Err(ArgumentError::CompactZeroTarget(bits));
                }
                Ok(Difficulty::CompactTarget {
                    unbounded: target.bits() > 256,
                    target: target_to_bytes(&target),
                })
            }
        }
    }

    /// Average number of attempts needed to find an accepted hash.
    pub fn expected_attempts(&self, bits: u32) -> Result<f64, ArgumentError> {
        match self {
            DifficultyPolicy::HexPrefix => {
                check_hex_zeros(bits)?;
                Ok(16f64.powi(bits as i32))
            }
            DifficultyPolicy::CompactTarget => {
                let target = compact_to_target(bits)?;
                if target == BigUint::default() {
                    return Err(ArgumentError::CompactZeroTarget(bits));
                }
                let target = target_to_f64(&target);
                Ok((2f64.powi(256) / (target + 1.0)).max(1.0))
            }
        }
    }
}

impl core::fmt::Display for DifficultyPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded difficulty, cheap to evaluate once per mining attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difficulty {
    HexPrefix { zeros: u32 },
    CompactTarget { target: [u8; 32], unbounded: bool },
}

impl Difficulty {
    /// Returns true if the hash satisfies this difficulty.
    #[inline]
    pub fn is_met(&self, hash: &Hash256) -> bool {
        match self {
            Difficulty::HexPrefix { zeros } => hex_prefix_is_zero(hash, *zeros),
            Difficulty::CompactTarget { target, unbounded } => {
                *unbounded || hash_meets_target(hash, target)
            }
        }
    }
}

/// Check that the first `zeros` hex nibbles of the hash are zero.
///
/// `zeros / 2` whole bytes must be zero, and for odd `zeros` the high nibble
/// of the following byte as well.
pub fn meets_hex_prefix(hash: &Hash256, zeros: u32) -> Result<bool, ArgumentError> {
    check_hex_zeros(zeros)?;
    Ok(hex_prefix_is_zero(hash, zeros))
}

fn check_hex_zeros(zeros: u32) -> Result<(), ArgumentError> {
    if !(1..=MAX_HEX_ZEROS).contains(&zeros) {
        return Err(ArgumentError::HexZerosOutOfRange(zeros));
    }
    Ok(())
}

#[inline]
fn hex_prefix_is_zero(hash: &Hash256, zeros: u32) -> bool {
    let full_bytes = (zeros / 2) as usize;
    if hash[..full_bytes].iter().any(|byte| *byte != 0) {
        return false;
    }
    if zeros % 2 == 1 && hash[full_bytes] >> 4 != 0 {
        return false;
    }
    true
}

/// Decode a compact target.
///
/// Target = mantissa * 256^(exponent - 3), shifted right when the exponent is
/// below 3. Arbitrary precision, so every exponent byte is representable.
pub fn compact_to_target(bits: u32) -> Result<BigUint, ArgumentError> {
    let exponent = bits >> 24;
    let mantissa = bits & MANTISSA_MASK;

    if bits & SIGN_BIT != 0 {
        return Err(ArgumentError::CompactNegative(bits));
    }
    if mantissa == 0 {
        return Err(ArgumentError::CompactZeroMantissa(bits));
    }

    let mantissa = BigUint::from(mantissa);
    if exponent >= 3 {
        Ok(mantissa << (8 * (exponent - 3)))
    } else {
        Ok(mantissa >> (8 * (3 - exponent)))
    }
}

/// Check a hash against a compact target: `hash <= target` and `target > 0`.
///
/// A zero target is a valid encoding that no hash meets.
pub fn meets_compact_target(hash: &Hash256, bits: u32) -> Result<bool, ArgumentError> {
    let target = compact_to_target(bits)?;
    if target == BigUint::default() {
        return Ok(false);
    }
    Ok(BigUint::from_bytes_be(hash) <= target)
}

/// Encode a target in compact form.
///
/// Returns `None` if the target is too wide for a one-byte exponent.
pub fn target_to_compact(target: &BigUint) -> Option<u32> {
    if *target == BigUint::default() {
        return Some(0);
    }

    let bytes = target.to_bytes_be();
    let mut size = bytes.len();

    // Up to 3 most significant bytes
    let mut mantissa: u32 = 0;
    for i in 0..3 {
        mantissa <<= 8;
        if let Some(byte) = bytes.get(i) {
            mantissa |= *byte as u32;
        }
    }

    // Keep the sign bit clear
    if mantissa & SIGN_BIT != 0 {
        mantissa >>= 8;
        size += 1;
    }

    if size > 0xFF {
        return None;
    }
    Some(((size as u32) << 24) | (mantissa & MANTISSA_MASK))
}

/// The least significant 32 bytes of a target, big-endian and left-padded.
pub fn target_to_bytes(target: &BigUint) -> [u8; 32] {
    let bytes = target.to_bytes_be();
    let mut out = [0u8; 32];
    if bytes.len() >= 32 {
        out.copy_from_slice(&bytes[bytes.len() - 32..]);
    } else {
        out[32 - bytes.len()..].copy_from_slice(&bytes);
    }
    out
}

/// Compare as 256-bit big-endian numbers: true if hash <= target.
#[inline]
pub fn hash_meets_target(hash: &Hash256, target: &[u8; 32]) -> bool {
    hash <= target
}

fn target_to_f64(target: &BigUint) -> f64 {
    target
        .to_bytes_be()
        .iter()
        .fold(0.0, |acc, byte| acc * 256.0 + *byte as f64)
}
