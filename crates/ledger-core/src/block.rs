use crate::constants::{
    GENESIS_DIFFICULTY, GENESIS_HASH, GENESIS_LAST_HASH, GENESIS_TIMESTAMP, MINE_RATE,
    MIN_DIFFICULTY,
};
use crate::{crypto_hash::crypto_hash, pow::leading_hex_zeros, Payload};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// One committed unit of the ledger.
///
/// The serialized form carries exactly these six fields; the hash covers
/// all of them except itself, so unknown fields are refused on input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Block {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub last_hash: String,
    pub hash: String,
    pub data: Payload,
    pub nonce: u64,
    pub difficulty: u32,
}

impl Block {
    /// The hard-coded first block. Never mined.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: Payload::Array(Vec::new()),
            nonce: 0,
            difficulty: GENESIS_DIFFICULTY,
        }
    }

    pub fn is_genesis(&self) -> bool {
        *self == Self::genesis()
    }

    /// Digest over the five hashed fields.
    pub fn compute_hash(
        timestamp: u64,
        last_hash: &str,
        data: &Payload,
        nonce: u64,
        difficulty: u32,
    ) -> String {
        crypto_hash(&[&timestamp, &last_hash, data, &nonce, &difficulty])
    }

    /// Recompute this block's digest from its own fields.
    pub fn recompute_hash(&self) -> String {
        Self::compute_hash(
            self.timestamp,
            &self.last_hash,
            &self.data,
            self.nonce,
            self.difficulty,
        )
    }

    /// Whether the stored hash carries the work its difficulty claims.
    pub fn meets_difficulty(&self) -> bool {
        leading_hex_zeros(&self.hash) >= self.difficulty
    }

    /// Retarget against `last_block`: ease by one when the gap exceeds
    /// [`MINE_RATE`], tighten by one otherwise. Never below [`MIN_DIFFICULTY`].
    pub fn adjust_difficulty(last_block: &Block, timestamp: u64) -> u32 {
        let difficulty = last_block.difficulty;
        if timestamp.saturating_sub(last_block.timestamp) > MINE_RATE {
            difficulty.saturating_sub(1).max(MIN_DIFFICULTY)
        } else {
            difficulty.saturating_add(1).max(MIN_DIFFICULTY)
        }
    }

    /// Mine a successor of `last_block` carrying `data`.
    ///
    /// Difficulty is retargeted on every attempt against the attempt's own
    /// timestamp, so the stored difficulty always matches the stored time.
    pub fn mine_block(last_block: &Block, data: Payload) -> Block {
        let mut nonce = 0u64;
        loop {
            nonce = nonce.wrapping_add(1);
            if let Some(block) = Self::attempt(last_block, &data, nonce, |ts| {
                Self::adjust_difficulty(last_block, ts)
            }) {
                return block;
            }
        }
    }

    /// Like [`Block::mine_block`] but polls `cancel` before every nonce.
    /// Returns `None` once the flag is raised.
    pub fn mine_block_until(last_block: &Block, data: Payload, cancel: &AtomicBool) -> Option<Block> {
        Self::mine_block_cancellable(last_block, data, || cancel.load(Ordering::Relaxed))
    }

    /// Like [`Block::mine_block`] but asks `cancelled` before every nonce,
    /// for callers that combine several stop conditions.
    pub fn mine_block_cancellable<C>(last_block: &Block, data: Payload, cancelled: C) -> Option<Block>
    where
        C: Fn() -> bool,
    {
        let mut nonce = 0u64;
        loop {
            if cancelled() {
                debug!(nonce, "mining cancelled");
                return None;
            }
            nonce = nonce.wrapping_add(1);
            if let Some(block) = Self::attempt(last_block, &data, nonce, |ts| {
                Self::adjust_difficulty(last_block, ts)
            }) {
                return Some(block);
            }
        }
    }

    /// Mine at a fixed difficulty, skipping retargeting.
    pub fn mine_at_difficulty(last_block: &Block, data: Payload, difficulty: u32) -> Block {
        let mut nonce = 0u64;
        loop {
            nonce = nonce.wrapping_add(1);
            if let Some(block) = Self::attempt(last_block, &data, nonce, |_| difficulty) {
                return block;
            }
        }
    }

    /// One proof-of-work try at `nonce`, stamped with the current time.
    fn attempt<F>(last_block: &Block, data: &Payload, nonce: u64, difficulty_at: F) -> Option<Block>
    where
        F: Fn(u64) -> u32,
    {
        let timestamp = now_millis();
        let difficulty = difficulty_at(timestamp);
        let hash = Self::compute_hash(timestamp, &last_block.hash, data, nonce, difficulty);
        if leading_hex_zeros(&hash) < difficulty {
            return None;
        }

        debug!(nonce, difficulty, %hash, "mined block");
        Some(Block {
            timestamp,
            last_hash: last_block.hash.clone(),
            hash,
            data: data.clone(),
            nonce,
            difficulty,
        })
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
