pub mod api;
pub mod config;
pub mod peers;

use ledger_core::{chain::Chain, Block};
use ledger_storage::SledStore;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{watch, Mutex};

/// Shared by every handler. The chain sits behind one async mutex, which is
/// the only path to mine or replace. Reads go to `snapshot`, republished
/// after every committed change, so they never wait on a mine.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<Mutex<Chain<SledStore>>>,
    pub snapshot: Arc<watch::Sender<Arc<Vec<Block>>>>,
    pub peers: Arc<Vec<String>>,
    pub client: reqwest::Client,
    /// Raised on shutdown; an in-flight mine gives up at its next nonce.
    pub cancel: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(chain: Chain<SledStore>, peers: Vec<String>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(chain.ledger().chain().to_vec()));
        Self {
            chain: Arc::new(Mutex::new(chain)),
            snapshot: Arc::new(snapshot),
            peers: Arc::new(peers),
            client: reqwest::Client::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Latest committed chain, without touching the chain lock.
    pub fn blocks(&self) -> Arc<Vec<Block>> {
        self.snapshot.borrow().clone()
    }

    /// Call with the chain guard still held so snapshots publish in commit order.
    pub fn publish(&self, chain: &Chain<SledStore>) -> Arc<Vec<Block>> {
        let blocks = Arc::new(chain.ledger().chain().to_vec());
        self.snapshot.send_replace(blocks.clone());
        blocks
    }
}

/// Raises its flag when dropped. Tied to a request, it stops the search
/// once the client is gone and the handler future is dropped.
pub struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (Self(flag.clone()), flag)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}
