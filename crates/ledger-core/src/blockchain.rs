use crate::{Block, Payload, ReplaceError, ValidationError};
use rayon::prelude::*;
use tracing::info;

/// The authoritative append-only history. Never empty; always starts with
/// [`Block::genesis`].
#[derive(Clone, Debug, PartialEq)]
pub struct Blockchain {
    chain: Vec<Block>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
        }
    }

    /// Rebuild a ledger from a previously stored sequence.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ValidationError> {
        Self::validate_chain(&blocks)?;
        Ok(Self { chain: blocks })
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Never true: a ledger always holds at least genesis.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        // chain is never empty
        &self.chain[self.chain.len() - 1]
    }

    /// Mine a block on top of the tip and append it.
    pub fn add_block(&mut self, data: Payload) -> &Block {
        let block = Block::mine_block(self.last_block(), data);
        self.chain.push(block);
        self.last_block()
    }

    /// Append a block mined elsewhere, checked against the current tip.
    pub fn append_block(&mut self, block: Block) -> Result<&Block, ValidationError> {
        self.check_next(&block)?;
        self.chain.push(block);
        Ok(self.last_block())
    }

    /// Longest valid chain wins. Equal length keeps the current chain.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<(), ReplaceError> {
        self.check_replacement(&candidate)?;
        self.commit_replacement(candidate);
        Ok(())
    }

    /// Whether `block` would be accepted by [`Blockchain::append_block`].
    pub fn check_next(&self, block: &Block) -> Result<(), ValidationError> {
        check_link(self.last_block(), block, self.chain.len() as u64)
    }

    /// Whether `candidate` would be accepted by [`Blockchain::replace_chain`].
    /// Length is checked before validity.
    pub fn check_replacement(&self, candidate: &[Block]) -> Result<(), ReplaceError> {
        if candidate.len() <= self.chain.len() {
            return Err(ReplaceError::TooShort {
                candidate: candidate.len(),
                current: self.chain.len(),
            });
        }
        Self::validate_chain(candidate)?;
        Ok(())
    }

    /// Push a block that already passed [`Blockchain::check_next`].
    pub(crate) fn push_checked(&mut self, block: Block) {
        self.chain.push(block);
    }

    /// Swap in a candidate that already passed [`Blockchain::check_replacement`].
    pub(crate) fn commit_replacement(&mut self, candidate: Vec<Block>) {
        info!(
            from = self.chain.len(),
            to = candidate.len(),
            "replacing chain"
        );
        self.chain = candidate;
    }

    pub fn is_valid_chain(candidate: &[Block]) -> bool {
        Self::validate_chain(candidate).is_ok()
    }

    /// Check genesis, then every adjacent pair. Reports the lowest failing
    /// height when several blocks are bad.
    pub fn validate_chain(candidate: &[Block]) -> Result<(), ValidationError> {
        let first = candidate.first().ok_or(ValidationError::Empty)?;
        if !first.is_genesis() {
            return Err(ValidationError::BadGenesis);
        }

        match candidate
            .par_windows(2)
            .enumerate()
            .find_map_first(|(i, pair)| check_link(&pair[0], &pair[1], i as u64 + 1).err())
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Per-pair rules shared by validation and `append_block`.
fn check_link(prev: &Block, block: &Block, height: u64) -> Result<(), ValidationError> {
    if block.last_hash != prev.hash {
        return Err(ValidationError::BrokenLink { height });
    }
    if block.hash != block.recompute_hash() {
        return Err(ValidationError::HashMismatch { height });
    }
    if block.difficulty.abs_diff(prev.difficulty) > 1 {
        return Err(ValidationError::DifficultyJump {
            height,
            from: prev.difficulty,
            to: block.difficulty,
        });
    }
    if block.difficulty == 0 {
        return Err(ValidationError::ZeroDifficulty { height });
    }
    if !block.meets_difficulty() {
        return Err(ValidationError::InsufficientWork {
            height,
            difficulty: block.difficulty,
        });
    }
    Ok(())
}

/// Turn an untrusted JSON value into a candidate chain. Any shape problem
/// becomes [`ValidationError::Malformed`].
pub fn parse_candidate(value: serde_json::Value) -> Result<Vec<Block>, ValidationError> {
    serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))
}
