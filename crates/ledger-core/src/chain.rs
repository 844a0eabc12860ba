use crate::{Block, Blockchain, Payload, ReplaceError, ValidationError};
use anyhow::{Context, Result};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Trait the storage backends should implement for the chain to operate.
/// This lives in `ledger-core` to avoid a circular dependency.
pub trait ChainStore: Send + Sync {
    fn put_block(&self, height: u64, block: &Block) -> Result<()>;
    fn get_block(&self, height: u64) -> Result<Option<Block>>;
    /// Every stored block in height order.
    fn load_chain(&self) -> Result<Vec<Block>>;
    /// Atomically swap the stored history for `blocks`.
    fn replace_chain(&self, blocks: &[Block]) -> Result<()>;
    /// `None` when nothing is stored yet.
    fn tip_height(&self) -> Result<Option<u64>>;
    fn close(&self) -> Result<()>;
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Rejected(#[from] ReplaceError),
    #[error("block refused: {0}")]
    InvalidBlock(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A [`Blockchain`] that writes every change through to a [`ChainStore`].
///
/// Not synchronized; the embedding owns it behind a single lock or task.
pub struct Chain<S: ChainStore> {
    ledger: Blockchain,
    store: Arc<S>,
}

impl<S: ChainStore> Chain<S> {
    /// Load the persisted history, or seed the store with genesis when it
    /// is empty. A stored history that fails validation is an error.
    pub fn open(store: Arc<S>) -> Result<Self> {
        let blocks = store.load_chain().context("loading stored chain")?;
        let ledger = if blocks.is_empty() {
            let ledger = Blockchain::new();
            store.put_block(0, ledger.last_block())?;
            info!("seeded store with genesis block");
            ledger
        } else {
            let height = blocks.len() - 1;
            let ledger =
                Blockchain::from_blocks(blocks).context("stored chain failed validation")?;
            info!(height, "loaded stored chain");
            ledger
        };
        Ok(Self { ledger, store })
    }

    pub fn ledger(&self) -> &Blockchain {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Height of the tip; genesis is height 0.
    pub fn height(&self) -> u64 {
        self.ledger.len() as u64 - 1
    }

    /// Mine on top of the tip, persist, then append.
    pub fn add_block(&mut self, data: Payload) -> Result<Block> {
        let block = Block::mine_block(self.ledger.last_block(), data);
        self.store.put_block(self.height() + 1, &block)?;
        self.ledger.push_checked(block.clone());
        Ok(block)
    }

    /// Append a block mined off-thread. Nothing changes in memory unless
    /// the block is valid and the store accepted it.
    pub fn append_block(&mut self, block: Block) -> Result<(), ChainError> {
        self.ledger.check_next(&block)?;
        self.store.put_block(self.height() + 1, &block)?;
        self.ledger.push_checked(block);
        Ok(())
    }

    /// Longest valid chain wins. The store is rewritten before the
    /// in-memory chain is swapped.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<(), ChainError> {
        self.ledger.check_replacement(&candidate)?;
        self.store.replace_chain(&candidate)?;
        self.ledger.commit_replacement(candidate);
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}
