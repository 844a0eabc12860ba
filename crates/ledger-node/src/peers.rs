use crate::{api::report_rejection, AppState};
use anyhow::{Context, Result};
use ledger_core::{chain::ChainError, parse_candidate, Block, ReplaceError};
use tracing::{info, warn};

/// Fetch a peer's full chain from `GET {peer}/api/blocks`.
pub async fn fetch_chain(client: &reqwest::Client, peer: &str) -> Result<Vec<Block>> {
    let value: serde_json::Value = client
        .get(format!("{peer}/api/blocks"))
        .send()
        .await
        .with_context(|| format!("requesting chain from {peer}"))?
        .error_for_status()?
        .json()
        .await
        .with_context(|| format!("reading chain from {peer}"))?;
    Ok(parse_candidate(value)?)
}

/// What [`sync_on_join`] did.
#[derive(Debug)]
pub enum SyncOutcome {
    /// No peers configured, or none answered.
    NoPeerReachable,
    Adopted { peer: String, height: u64 },
    Rejected { peer: String, reason: ReplaceError },
}

/// Adopt the first reachable peer's chain if it is longer and valid.
/// Unreachable peers and rejected chains are logged, not fatal.
pub async fn sync_on_join(state: &AppState) -> Result<SyncOutcome> {
    for peer in state.peers.iter() {
        let candidate = match fetch_chain(&state.client, peer).await {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(peer = %peer, error = %format!("{e:#}"), "peer unreachable");
                continue;
            }
        };

        let mut chain = state.chain.lock().await;
        return match chain.replace_chain(candidate) {
            Ok(()) => {
                state.publish(&chain);
                let height = chain.height();
                info!(peer = %peer, height, "synced chain from peer");
                Ok(SyncOutcome::Adopted { peer: peer.clone(), height })
            }
            Err(ChainError::Rejected(reason)) => {
                report_rejection(peer, &reason);
                Ok(SyncOutcome::Rejected { peer: peer.clone(), reason })
            }
            Err(other) => Err(other.into()),
        };
    }
    Ok(SyncOutcome::NoPeerReachable)
}

/// Push `chain` to every peer's `POST /api/chain` in the background.
pub fn broadcast(state: &AppState, chain: Vec<Block>) {
    if state.peers.is_empty() {
        return;
    }
    let body = std::sync::Arc::new(chain);
    for peer in state.peers.iter().cloned() {
        let client = state.client.clone();
        let body = body.clone();
        tokio::spawn(async move {
            let url = format!("{peer}/api/chain");
            match client.post(&url).json(body.as_ref()).send().await {
                Ok(res) if res.status().is_success() => info!(peer = %peer, "chain broadcast accepted"),
                Ok(res) => warn!(peer = %peer, status = %res.status(), "chain broadcast refused"),
                Err(e) => warn!(peer = %peer, error = %e, "chain broadcast failed"),
            }
        });
    }
}
