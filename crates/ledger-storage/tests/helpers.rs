#![allow(dead_code)]

use std::fs;

use ledger_core::{Block, Blockchain};
use ledger_storage::SledStore;
use rand::Rng;
use serde_json::json;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = SledStore::open(temp_dir.path()).expect("Failed to open SledStore");
    (temp_dir, store)
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

/// A valid chain of `len` blocks (genesis included) with random payloads.
/// Difficulty alternates between 2 and 3 so the chain stays cheap to mine.
pub fn honest_chain(len: usize) -> Vec<Block> {
    let mut rng = rand::thread_rng();
    let mut ledger = Blockchain::new();
    for i in 1..len {
        let difficulty = if i % 2 == 0 { 3 } else { 2 };
        let payload = json!({ "seq": i, "value": rng.gen::<u32>() });
        let block = Block::mine_at_difficulty(ledger.last_block(), payload, difficulty);
        ledger.append_block(block).expect("honest block");
    }
    ledger.into_blocks()
}
