//! Nonce search over a block header.
//!
//! A [`Miner`] moves `Idle -> Searching -> Found | Exhausted` on every call.
//! It starts from the header's current nonce, hashes every candidate, and
//! stops the moment the active [`DifficultyPolicy`] accepts a hash. The
//! header is borrowed mutably for the whole call, so no other code can
//! observe or change it mid-search.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::block::{current_timestamp, BlockHeader, HEADER_SIZE};
use crate::config::MinerConfig;
use crate::difficulty::DifficultyPolicy;
use crate::error::ArgumentError;
use crate::hash::{double_sha256, leading_zero_nibbles, to_hex, Hash256};

/// Stop conditions for a bounded search. Both `None` means search forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MiningLimits {
    /// Maximum number of hashes to compute.
    pub max_attempts: Option<u64>,
    /// Wall-clock budget measured from the start of the call.
    pub deadline: Option<Duration>,
}

impl MiningLimits {
    pub fn unbounded() -> Self {
        MiningLimits::default()
    }

    pub fn attempts(max_attempts: u64) -> Self {
        MiningLimits::default().with_max_attempts(max_attempts)
    }

    pub fn deadline(deadline: Duration) -> Self {
        MiningLimits::default().with_deadline(deadline)
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none() && self.deadline.is_none()
    }

    pub fn validate(&self) -> Result<(), ArgumentError> {
        if self.max_attempts == Some(0) {
            return Err(ArgumentError::ZeroAttemptLimit);
        }
        Ok(())
    }
}

/// Where the miner is in its current or most recent search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerState {
    Idle,
    Searching,
    Found,
    Exhausted,
}

/// Counters for one search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiningStats {
    /// Hashes computed.
    pub attempts: u64,
    /// Time spent in the search.
    pub elapsed: Duration,
    /// Most leading zero hex nibbles seen on any candidate hash.
    pub best_zero_nibbles: u32,
}

impl MiningStats {
    pub fn hashes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        format_hash_rate(self.hashes_per_second())
    }
}

fn format_hash_rate(rate: f64) -> String {
    if rate >= 1_000_000_000.0 {
        format!("{:.2} GH/s", rate / 1_000_000_000.0)
    } else if rate >= 1_000_000.0 {
        format!("{:.2} MH/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.2} KH/s", rate / 1_000.0)
    } else {
        format!("{:.2} H/s", rate)
    }
}

/// Result of a search. Running out of budget is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum MiningOutcome {
    /// The header now carries `nonce` and hashes to `hash`.
    Found {
        nonce: u32,
        hash: Hash256,
        stats: MiningStats,
    },
    /// No accepted hash within the limits. The header's nonce is the next
    /// untried value, so a later call resumes where this one stopped.
    Exhausted { stats: MiningStats },
}

impl MiningOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, MiningOutcome::Found { .. })
    }

    pub fn stats(&self) -> &MiningStats {
        match self {
            MiningOutcome::Found { stats, .. } | MiningOutcome::Exhausted { stats } => stats,
        }
    }
}

/// Proof-of-work searcher bound to one difficulty policy.
#[derive(Debug, Clone)]
pub struct Miner {
    policy: DifficultyPolicy,
    config: MinerConfig,
    state: MinerState,
}

impl Miner {
    pub fn new(policy: DifficultyPolicy, config: MinerConfig) -> Result<Self, ArgumentError> {
        config.validate()?;
        Ok(Miner {
            policy,
            config,
            state: MinerState::Idle,
        })
    }

    pub fn policy(&self) -> DifficultyPolicy {
        self.policy
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn state(&self) -> MinerState {
        self.state
    }

    /// Search until an accepted hash is found. May run for a very long time
    /// on hard difficulties; interactive callers should use
    /// [`Miner::mine_with_limits`].
    pub fn mine(&mut self, header: &mut BlockHeader) -> Result<MiningOutcome, ArgumentError> {
        self.mine_with_limits(header, &MiningLimits::unbounded())
    }

    /// Search until an accepted hash is found or a limit is reached.
    ///
    /// Fails only if `header.bits()` is not valid under the miner's policy or
    /// the limits are malformed; the header is left untouched in that case.
    pub fn mine_with_limits(
        &mut self,
        header: &mut BlockHeader,
        limits: &MiningLimits,
    ) -> Result<MiningOutcome, ArgumentError> {
        limits.validate()?;
        let difficulty = self.policy.prepare(header.bits())?;

        self.state = MinerState::Searching;
        let start = Instant::now();
        let deadline = limits.deadline.and_then(|d| start.checked_add(d));

        // Pre-serialize everything but the nonce
        let mut buf = [0u8; HEADER_SIZE];
        buf[..80].copy_from_slice(&header.serialize_without_nonce());

        let mut nonce = header.nonce();
        let mut attempts = 0u64;
        let mut best_zero_nibbles = 0u32;

        trace!(
            policy = %self.policy,
            bits = header.bits(),
            start_nonce = nonce,
            "nonce search started"
        );

        loop {
            let out_of_attempts = limits.max_attempts.is_some_and(|max| attempts >= max);
            let out_of_time = deadline.is_some_and(|d| Instant::now() >= d);
            if out_of_attempts || out_of_time {
                header.set_nonce(nonce);
                self.state = MinerState::Exhausted;
                return Ok(MiningOutcome::Exhausted {
                    stats: MiningStats {
                        attempts,
                        elapsed: start.elapsed(),
                        best_zero_nibbles,
                    },
                });
            }

            buf[80..].copy_from_slice(&nonce.to_be_bytes());
            let hash = double_sha256(&buf);
            attempts += 1;
            best_zero_nibbles = best_zero_nibbles.max(leading_zero_nibbles(&hash));

            if difficulty.is_met(&hash) {
                header.set_nonce(nonce);
                self.state = MinerState::Found;
                let stats = MiningStats {
                    attempts,
                    elapsed: start.elapsed(),
                    best_zero_nibbles,
                };
                debug!(
                    nonce,
                    attempts,
                    hash = %to_hex(&hash),
                    hash_rate = %stats.format_hash_rate(),
                    "nonce found"
                );
                return Ok(MiningOutcome::Found { nonce, hash, stats });
            }

            if attempts % self.config.telemetry_interval == 0 {
                let elapsed = start.elapsed().as_secs_f64();
                let rate = if elapsed > 0.0 {
                    attempts as f64 / elapsed
                } else {
                    0.0
                };
                debug!(
                    attempts,
                    nonce,
                    timestamp = header.timestamp(),
                    best_zero_nibbles,
                    hash_rate = %format_hash_rate(rate),
                    "mining progress"
                );
            }

            nonce = nonce.wrapping_add(1);
            let wrapped = nonce == 0;
            if wrapped || attempts % self.config.timestamp_refresh_interval == 0 {
                // Never move backwards; a fresh nonce epoch needs an unused timestamp
                let floor = if wrapped {
                    header.timestamp().saturating_add(1)
                } else {
                    header.timestamp()
                };
                let timestamp = current_timestamp().max(floor);
                if wrapped {
                    debug!(attempts, timestamp, "nonce space wrapped");
                }
                header.set_timestamp(timestamp);
                buf[68..76].copy_from_slice(&timestamp.to_be_bytes());
            }
        }
    }
}
