use anyhow::{Context, Result};
use ledger_core::{chain::ChainStore, Block};
use sled::{Batch, Db, IVec};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";

/// Blocks keyed by big-endian height, stored in their JSON wire form.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).with_context(|| format!("opening sled at {}", path.display()))?;
        info!(path = %path.display(), "sled store opened");
        Ok(Self { db })
    }

    fn blocks(&self) -> Result<sled::Tree> {
        self.db.open_tree(TREE_BLOCKS).context("opening blocks tree")
    }

    /// Remove every stored block.
    pub fn clear(&self) -> Result<()> {
        self.blocks()?.clear()?;
        self.db.flush()?;
        Ok(())
    }
}

fn decode_block(bytes: &IVec) -> Result<Block> {
    serde_json::from_slice(bytes).context("decoding stored block")
}

fn decode_height(key: &IVec) -> Result<u64> {
    let arr: [u8; 8] = (&key[..]).try_into().context("stored height key is not 8 bytes")?;
    Ok(u64::from_be_bytes(arr))
}

impl ChainStore for SledStore {
    fn put_block(&self, height: u64, block: &Block) -> Result<()> {
        let bytes = serde_json::to_vec(block)?;
        self.blocks()?.insert(height.to_be_bytes(), bytes)?;
        self.db.flush()?;
        debug!(height, "block stored");
        Ok(())
    }

    fn get_block(&self, height: u64) -> Result<Option<Block>> {
        self.blocks()?
            .get(height.to_be_bytes())?
            .map(|ivec| decode_block(&ivec))
            .transpose()
    }

    fn load_chain(&self) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for (expected, entry) in self.blocks()?.iter().enumerate() {
            let (key, value) = entry?;
            let height = decode_height(&key)?;
            anyhow::ensure!(
                height == expected as u64,
                "stored chain has a gap: expected height {expected}, found {height}"
            );
            blocks.push(decode_block(&value)?);
        }
        Ok(blocks)
    }

    fn replace_chain(&self, blocks: &[Block]) -> Result<()> {
        let tree = self.blocks()?;
        let mut batch = Batch::default();

        let keep = blocks.len() as u64;
        for key in tree.range(keep.to_be_bytes()..).keys() {
            batch.remove(key?);
        }
        for (height, block) in blocks.iter().enumerate() {
            batch.insert(&(height as u64).to_be_bytes()[..], serde_json::to_vec(block)?);
        }

        tree.apply_batch(batch)?;
        self.db.flush()?;
        info!(height = keep.saturating_sub(1), "stored chain replaced");
        Ok(())
    }

    fn tip_height(&self) -> Result<Option<u64>> {
        self.blocks()?
            .last()?
            .map(|(key, _)| decode_height(&key))
            .transpose()
    }

    fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
