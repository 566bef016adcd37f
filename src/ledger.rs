use crate::config::LedgerConfig;
use crate::error::{AppendError, ChainFault, FaultKind, MineError, SealError};
use crate::models::{now_millis, Block, BlockData, Vote, GENESIS_PREVIOUS_HASH};
use crate::pow::{self, CancelFlag};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

/// A sealed vote together with the block that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteRecord {
    pub voter_id: String,
    pub candidate: String,
    pub block_index: u64,
    pub block_hash: String,
}

#[derive(Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Vote>,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Ledger {
            chain: vec![Block::genesis(now_millis())],
            pending: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Vote] {
        &self.pending
    }

    pub fn last_block(&self) -> &Block {
        self.chain.last().expect("chain always holds genesis")
    }

    /// Queues a vote for the next block. No deduplication.
    pub fn add_vote(&mut self, voter_id: impl Into<String>, candidate: impl Into<String>) {
        self.pending.push(Vote::new(voter_id, candidate));
    }

    /// Seals `block` at the configured difficulty.
    pub fn seal(&self, block: &mut Block) -> Result<String, SealError> {
        self.seal_with(block, self.config.difficulty, &CancelFlag::new())
    }

    pub fn seal_with(
        &self,
        block: &mut Block,
        difficulty: usize,
        cancel: &CancelFlag,
    ) -> Result<String, SealError> {
        pow::seal(block, difficulty, self.config.max_attempts, cancel)
    }

    /// Appends a sealed block onto the tip, returning its index.
    pub fn append(&mut self, block: Block, proof: &str) -> Result<u64, AppendError> {
        let tip_hash = &self.last_block().hash;
        if *tip_hash != block.previous_hash {
            let err = AppendError::ParentMismatch {
                expected: tip_hash.clone(),
                found: block.previous_hash.clone(),
            };
            warn!("rejected block {}: {}", block.index, err);
            return Err(err);
        }

        let difficulty = self.config.difficulty;
        if !pow::meets_difficulty(proof, difficulty) {
            warn!("rejected block {}: proof {} below difficulty {}", block.index, proof, difficulty);
            return Err(AppendError::InvalidProofFormat { difficulty });
        }
        if proof != block.compute_hash() {
            warn!("rejected block {}: proof does not match digest", block.index);
            return Err(AppendError::ProofMismatch);
        }

        let index = block.index;
        info!("appended block {} ({})", index, block.hash);
        self.chain.push(block);
        Ok(index)
    }

    pub fn mine(&mut self) -> Result<u64, MineError> {
        self.mine_with(&CancelFlag::new())
    }

    /// Seals every pending vote into a new block and appends it.
    /// `pending` is cleared only when the append succeeds.
    pub fn mine_with(&mut self, cancel: &CancelFlag) -> Result<u64, MineError> {
        if self.pending.is_empty() {
            return Err(MineError::NothingPending);
        }

        let tip = self.last_block();
        let mut candidate = Block::new(
            tip.index + 1,
            now_millis(),
            BlockData::Votes(self.pending.clone()),
            tip.hash.clone(),
        );

        let proof = self.seal_with(&mut candidate, self.config.difficulty, cancel)?;
        let sealed = candidate.votes().len();
        let index = self.append(candidate, &proof)?;
        self.pending.clear();

        info!("mined block {} with {} votes", index, sealed);
        Ok(index)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Re-hashes every non-genesis block and checks each parent link.
    /// Reports the first failing block.
    pub fn validate(&self) -> Result<(), ChainFault> {
        let genesis = &self.chain[0];
        if genesis.index != 0 || genesis.previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(self.fault(0, FaultKind::BrokenLink));
        }

        for (i, pair) in self.chain.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            if current.hash != current.compute_hash() {
                return Err(self.fault(i + 1, FaultKind::HashMismatch));
            }
            if current.previous_hash != previous.hash {
                return Err(self.fault(i + 1, FaultKind::BrokenLink));
            }
        }
        Ok(())
    }

    fn fault(&self, index: usize, kind: FaultKind) -> ChainFault {
        let fault = ChainFault { index, kind };
        warn!("chain invalid: {}", fault);
        fault
    }

    /// Every sealed vote, in chain order.
    pub fn history(&self) -> Vec<VoteRecord> {
        self.chain
            .iter()
            .flat_map(|block| {
                block.votes().iter().map(move |vote| VoteRecord {
                    voter_id: vote.voter_id.clone(),
                    candidate: vote.candidate.clone(),
                    block_index: block.index,
                    block_hash: block.hash.clone(),
                })
            })
            .collect()
    }

    pub fn votes_by_voter(&self, voter_id: &str) -> Vec<VoteRecord> {
        self.history()
            .into_iter()
            .filter(|record| record.voter_id == voter_id)
            .collect()
    }

    /// Sealed vote count per candidate.
    pub fn tally(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for vote in self.chain.iter().flat_map(|block| block.votes()) {
            *counts.entry(vote.candidate.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
