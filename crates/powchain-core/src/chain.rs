//! Append-only chain of mined blocks.
//!
//! Every operation takes the same lock, mining included, so concurrent
//! appends are serialized and never observed half-done or out of order.

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::block::{current_timestamp, Block, BlockHeader};
use crate::config::ChainConfig;
use crate::difficulty::DifficultyPolicy;
use crate::error::{ArgumentError, ChainError, StateError, VerificationError};
use crate::hash::{to_hex, Hash256, TxId, ZERO_HASH};
use crate::miner::{Miner, MiningLimits, MiningOutcome, MiningStats};

struct ChainState {
    blocks: Vec<Block>,
    miner: Miner,
}

/// A single local sequence of blocks linked by hash.
pub struct Chain {
    config: ChainConfig,
    state: Mutex<ChainState>,
}

enum Appended {
    Block(Block),
    Exhausted(MiningStats),
}

impl Chain {
    /// Create an empty chain. The config is validated up front.
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        config.validate()?;
        let miner = Miner::new(config.policy, config.miner)?;
        Ok(Chain {
            config,
            state: Mutex::new(ChainState {
                blocks: Vec::new(),
                miner,
            }),
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn policy(&self) -> DifficultyPolicy {
        self.config.policy
    }

    pub fn bits(&self) -> u32 {
        self.config.bits
    }

    /// Mine and store the genesis block.
    pub fn create_genesis(&self, txids: &[TxId]) -> Result<Block, ChainError> {
        match self.genesis_inner(txids, &MiningLimits::unbounded())? {
            Appended::Block(block) => Ok(block),
            Appended::Exhausted(stats) => Err(ChainError::SearchExhausted {
                attempts: stats.attempts,
            }),
        }
    }

    /// Like [`Chain::create_genesis`], but gives up after `limits`.
    ///
    /// Returns `Ok(None)` if the search ran out; the chain is unchanged.
    pub fn create_genesis_with_limits(
        &self,
        txids: &[TxId],
        limits: &MiningLimits,
    ) -> Result<Option<Block>, ChainError> {
        Ok(self.genesis_inner(txids, limits)?.into_block())
    }

    /// Mine a block on top of the current tip and store it.
    pub fn add_block(&self, txids: &[TxId]) -> Result<Block, ChainError> {
        match self.add_inner(txids, &MiningLimits::unbounded())? {
            Appended::Block(block) => Ok(block),
            Appended::Exhausted(stats) => Err(ChainError::SearchExhausted {
                attempts: stats.attempts,
            }),
        }
    }

    /// Like [`Chain::add_block`], but gives up after `limits`.
    ///
    /// Returns `Ok(None)` if the search ran out; the chain is unchanged.
    pub fn add_block_with_limits(
        &self,
        txids: &[TxId],
        limits: &MiningLimits,
    ) -> Result<Option<Block>, ChainError> {
        Ok(self.add_inner(txids, limits)?.into_block())
    }

    /// Re-check merkle roots, proof of work and hash links for every block.
    pub fn validate_chain(&self) -> bool {
        let state = self.state.lock();
        validate_blocks(&state.blocks, self.config.policy)
    }

    /// Number of blocks minus one; -1 for an empty chain.
    pub fn height(&self) -> i64 {
        self.state.lock().blocks.len() as i64 - 1
    }

    pub fn len(&self) -> usize {
        self.state.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().blocks.is_empty()
    }

    pub fn tip(&self) -> Option<Block> {
        self.state.lock().blocks.last().cloned()
    }

    pub fn tip_hash(&self) -> Option<Hash256> {
        self.state.lock().blocks.last().map(Block::hash)
    }

    pub fn block(&self, height: usize) -> Option<Block> {
        self.state.lock().blocks.get(height).cloned()
    }

    /// Copies of every stored block, genesis first.
    pub fn blocks(&self) -> Vec<Block> {
        self.state.lock().blocks.clone()
    }

    /// One debug line per block.
    pub fn summary(&self) -> Vec<String> {
        let state = self.state.lock();
        state
            .blocks
            .iter()
            .enumerate()
            .map(|(height, block)| {
                let header = block.header();
                format!(
                    "#{} hash={} prev={} merkle={} nonce={} bits={}",
                    height,
                    to_hex(&block.hash()),
                    to_hex(&header.prev_block_hash()),
                    to_hex(&header.merkle_root()),
                    header.nonce(),
                    header.bits()
                )
            })
            .collect()
    }

    fn genesis_inner(&self, txids: &[TxId], limits: &MiningLimits) -> Result<Appended, ChainError> {
        if txids.is_empty() {
            return Err(ArgumentError::EmptyTransactions.into());
        }
        limits.validate()?;

        let mut state = self.state.lock();
        if !state.blocks.is_empty() {
            return Err(StateError::GenesisExists.into());
        }

        let appended = self.mine_and_append(&mut state, ZERO_HASH, txids, limits)?;
        if let Appended::Block(block) = &appended {
            info!(
                hash = %to_hex(&block.hash()),
                nonce = block.header().nonce(),
                "genesis block created"
            );
        }
        Ok(appended)
    }

    fn add_inner(&self, txids: &[TxId], limits: &MiningLimits) -> Result<Appended, ChainError> {
        if txids.is_empty() {
            return Err(ArgumentError::EmptyTransactions.into());
        }
        limits.validate()?;

        let mut state = self.state.lock();
        let prev_hash = match state.blocks.last() {
            Some(tip) => tip.hash(),
            None => return Err(StateError::NoGenesis.into()),
        };

        let appended = self.mine_and_append(&mut state, prev_hash, txids, limits)?;
        if let Appended::Block(block) = &appended {
            info!(
                height = state.blocks.len() - 1,
                hash = %to_hex(&block.hash()),
                nonce = block.header().nonce(),
                "block appended"
            );
        }
        Ok(appended)
    }

    /// Build, verify, mine, re-verify and store one block. Caller holds the lock.
    fn mine_and_append(
        &self,
        state: &mut ChainState,
        prev_hash: Hash256,
        txids: &[TxId],
        limits: &MiningLimits,
    ) -> Result<Appended, ChainError> {
        let header = BlockHeader::new(
            self.config.version,
            prev_hash,
            ZERO_HASH,
            current_timestamp(),
            self.config.bits,
        )?;
        let mut block = Block::new(header, txids.to_vec())?;
        block.compute_and_set_merkle_root()?;

        if !block.verify() {
            return Err(VerificationError::MerkleMismatch.into());
        }

        match state.miner.mine_with_limits(block.header_mut(), limits)? {
            MiningOutcome::Found { .. } => {}
            MiningOutcome::Exhausted { stats } => {
                warn!(
                    attempts = stats.attempts,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    "nonce search exhausted, block not appended"
                );
                return Ok(Appended::Exhausted(stats));
            }
        }

        self.check_mined(&block, &prev_hash)?;
        state.blocks.push(block.clone());
        Ok(Appended::Block(block))
    }

    /// Post-mining checks. A failure here means the block was altered during
    /// the search and is never retried.
    fn check_mined(&self, block: &Block, prev_hash: &Hash256) -> Result<(), ChainError> {
        let hash = block.hash();
        if !self.config.policy.accepts(&hash, block.header().bits())? {
            error!(hash = %to_hex(&hash), "mined block fails proof of work");
            return Err(VerificationError::ProofOfWork.into());
        }
        if !block.verify() {
            error!(hash = %to_hex(&hash), "mined block fails merkle check");
            return Err(VerificationError::MerkleMismatch.into());
        }
        if block.header().prev_block_hash() != *prev_hash {
            error!(hash = %to_hex(&hash), "previous hash changed during mining");
            return Err(VerificationError::PrevHashChanged.into());
        }
        Ok(())
    }
}

impl Appended {
    fn into_block(self) -> Option<Block> {
        match self {
            Appended::Block(block) => Some(block),
            Appended::Exhausted(_) => None,
        }
    }
}

/// Fail-fast scan of a block sequence, reporting the first failure.
///
/// Each block must match its merkle root, satisfy `policy` under its own
/// `bits`, and link to its predecessor (all zeros for the first block).
pub fn verify_blocks(blocks: &[Block], policy: DifficultyPolicy) -> Result<(), VerificationError> {
    let mut expected_prev = ZERO_HASH;
    for (height, block) in blocks.iter().enumerate() {
        if !block.verify() {
            return Err(VerificationError::MerkleMismatch);
        }

        let hash = block.hash();
        if !matches!(policy.accepts(&hash, block.header().bits()), Ok(true)) {
            return Err(VerificationError::ProofOfWork);
        }

        if block.header().prev_block_hash() != expected_prev {
            return Err(VerificationError::BrokenLink {
                height: height as u64,
            });
        }
        expected_prev = hash;
    }
    Ok(())
}

/// Boolean form of [`verify_blocks`].
pub fn validate_blocks(blocks: &[Block], policy: DifficultyPolicy) -> bool {
    verify_blocks(blocks, policy).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::double_sha256;
    use crate::merkle::compute_merkle_root;
    use std::sync::Arc;
    use std::thread;

    fn txids(tag: &str, count: usize) -> Vec<TxId> {
        (0..count)
            .map(|i| double_sha256(format!("{}-{}", tag, i).as_bytes()))
            .collect()
    }

    fn mined_chain(blocks: usize) -> Chain {
        let chain = Chain::new(ChainConfig::hex_prefix(2)).unwrap();
        chain.create_genesis(&txids("genesis", 1)).unwrap();
        for i in 1..blocks {
            chain.add_block(&txids(&format!("block{}", i), i + 1)).unwrap();
        }
        chain
    }

    #[test]
    fn test_empty_chain() {
        let chain = Chain::new(ChainConfig::hex_prefix(1)).unwrap();
        assert_eq!(chain.height(), -1);
        assert_eq!(chain.len(), 0);
        assert!(chain.is_empty());
        assert!(chain.tip().is_none());
        assert!(chain.tip_hash().is_none());
        assert!(chain.validate_chain());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(matches!(
            Chain::new(ChainConfig::compact(0x1d000000)),
            Err(ChainError::Argument(ArgumentError::CompactZeroMantissa(_)))
        ));
    }

    #[test]
    fn test_new_rejects_zero_compact_target() {
        for bits in [0x00123456, 0x01000001, 0x00000004] {
            assert_eq!(
                Chain::new(ChainConfig::compact(bits)).err(),
                Some(ChainError::Argument(ArgumentError::CompactZeroTarget(bits)))
            );
        }
    }

    #[test]
    fn test_genesis() {
        let chain = Chain::new(ChainConfig::hex_prefix(2)).unwrap();
        let txs = txids("genesis", 3);
        let genesis = chain.create_genesis(&txs).unwrap();

        assert_eq!(chain.height(), 0);
        assert_eq!(genesis.header().prev_block_hash(), ZERO_HASH);
        assert_eq!(genesis.header().merkle_root(), compute_merkle_root(&txs).unwrap());
        assert_eq!(genesis.header().bits(), 2);
        assert!(DifficultyPolicy::HexPrefix.accepts(&genesis.hash(), 2).unwrap());
        assert_eq!(chain.tip(), Some(genesis.clone()));
        assert_eq!(chain.tip_hash(), Some(genesis.hash()));
        assert!(chain.validate_chain());
    }

    #[test]
    fn test_genesis_twice_is_conflict() {
        let chain = Chain::new(ChainConfig::hex_prefix(1)).unwrap();
        chain.create_genesis(&txids("a", 1)).unwrap();
        assert_eq!(
            chain.create_genesis(&txids("b", 1)),
            Err(ChainError::State(StateError::GenesisExists))
        );
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_add_before_genesis_is_conflict() {
        let chain = Chain::new(ChainConfig::hex_prefix(1)).unwrap();
        assert_eq!(
            chain.add_block(&txids("a", 1)),
            Err(ChainError::State(StateError::NoGenesis))
        );
    }

    #[test]
    fn test_empty_transactions_rejected() {
        let chain = Chain::new(ChainConfig::hex_prefix(1)).unwrap();
        assert_eq!(
            chain.create_genesis(&[]),
            Err(ChainError::Argument(ArgumentError::EmptyTransactions))
        );
        chain.create_genesis(&txids("a", 1)).unwrap();
        assert_eq!(
            chain.add_block(&[]),
            Err(ChainError::Argument(ArgumentError::EmptyTransactions))
        );
    }

    #[test]
    fn test_blocks_link_by_hash() {
        let chain = mined_chain(4);
        let blocks = chain.blocks();
        assert_eq!(blocks.len(), 4);
        assert_eq!(chain.height(), 3);
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].header().prev_block_hash(), pair[0].hash());
        }
        assert!(chain.validate_chain());
        assert_eq!(chain.summary().len(), 4);
        assert!(chain.summary()[0].starts_with("#0 hash="));
    }

    #[test]
    fn test_tampered_merkle_root_detected() {
        let chain = mined_chain(3);
        {
            let mut state = chain.state.lock();
            let header = state.blocks[1].header_mut();
            let mut root = header.merkle_root();
            root[5] ^= 0x01;
            header.set_merkle_root(root);
        }
        assert!(!chain.validate_chain());
    }

    #[test]
    fn test_tampered_prev_hash_detected() {
        let chain = mined_chain(3);
        {
            let mut state = chain.state.lock();
            let header = state.blocks[2].header_mut();
            let mut prev = header.prev_block_hash();
            prev[31] ^= 0x80;
            header.set_prev_block_hash(prev);
        }
        assert!(!chain.validate_chain());
    }

    #[test]
    fn test_tampered_genesis_link_detected() {
        let chain = mined_chain(1);
        {
            let mut state = chain.state.lock();
            let mut prev = ZERO_HASH;
            prev[0] = 0x01;
            state.blocks[0].header_mut().set_prev_block_hash(prev);
        }
        assert!(!chain.validate_chain());
    }

    #[test]
    fn test_tampered_transaction_detected() {
        let chain = mined_chain(2);
        {
            let mut state = chain.state.lock();
            let mut txs = state.blocks[1].transactions().to_vec();
            txs[0][0] ^= 0xFF;
            state.blocks[1].set_transactions(txs).unwrap();
        }
        assert!(!chain.validate_chain());
    }

    #[test]
    fn test_tampered_nonce_breaks_next_link() {
        let chain = mined_chain(3);
        {
            let mut state = chain.state.lock();
            let header = state.blocks[0].header_mut();
            let nonce = header.nonce();
            header.set_nonce(nonce.wrapping_add(1));
        }
        // Either the proof of work or the link from block 1 now fails
        assert!(!chain.validate_chain());
    }

    #[test]
    fn test_verify_blocks_reports_broken_link() {
        let chain = mined_chain(3);
        let mut blocks = chain.blocks();
        blocks.swap(1, 2);
        assert_eq!(
            verify_blocks(&blocks, DifficultyPolicy::HexPrefix),
            Err(VerificationError::BrokenLink { height: 1 })
        );
    }

    #[test]
    fn test_bounded_exhaustion_leaves_chain_unchanged() {
        let chain = Chain::new(ChainConfig::hex_prefix(64)).unwrap();
        let result = chain
            .create_genesis_with_limits(&txids("g", 1), &MiningLimits::attempts(100))
            .unwrap();
        assert!(result.is_none());
        assert!(chain.is_empty());
        assert_eq!(chain.height(), -1);
    }

    #[test]
    fn test_bounded_success() {
        let chain = Chain::new(ChainConfig::hex_prefix(1)).unwrap();
        let genesis = chain
            .create_genesis_with_limits(&txids("g", 1), &MiningLimits::attempts(100_000))
            .unwrap();
        assert!(genesis.is_some());
        let block = chain
            .add_block_with_limits(&txids("b", 2), &MiningLimits::attempts(100_000))
            .unwrap()
            .unwrap();
        assert_eq!(block.header().prev_block_hash(), genesis.unwrap().hash());
        assert!(chain.validate_chain());
    }

    #[test]
    fn test_compact_policy_chain() {
        // 0xffff * 256^29: roughly one hash in 256 qualifies
        let chain = Chain::new(ChainConfig::compact(0x2000ffff)).unwrap();
        chain.create_genesis(&txids("g", 2)).unwrap();
        chain.add_block(&txids("b", 5)).unwrap();
        assert!(chain.validate_chain());

        // The same blocks read under the other policy are not valid
        assert!(!validate_blocks(&chain.blocks(), DifficultyPolicy::HexPrefix));
    }

    #[test]
    fn test_concurrent_appends_are_serialized() {
        let chain = Arc::new(mined_chain(1));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let chain = Arc::clone(&chain);
                thread::spawn(move || {
                    for i in 0..3 {
                        chain.add_block(&txids(&format!("t{}-{}", t, i), 2)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(chain.len(), 13);
        assert!(chain.validate_chain());
    }
}
