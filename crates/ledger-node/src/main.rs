use anyhow::Context;
use clap::Parser;
use ledger_core::chain::Chain;
use ledger_node::{api, config::Args, peers, AppState};
use ledger_storage::SledStore;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = Arc::new(SledStore::open(&args.data_dir)?);
    let chain = Chain::open(store).context("opening chain")?;
    let state = AppState::new(chain, args.peers.clone());

    let synced = peers::sync_on_join(&state).await?;
    if matches!(synced, peers::SyncOutcome::NoPeerReachable) && !args.peers.is_empty() {
        warn!("no peer reachable, starting from the local chain");
    }

    let app = api::router(state.clone());
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!("ledger-node listening on http://{}", args.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.cancel.clone()))
        .await?;

    state.chain.lock().await.close()?;
    info!("ledger-node stopped");
    Ok(())
}

async fn shutdown_signal(cancel: Arc<AtomicBool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
    cancel.store(true, Ordering::Relaxed);
}
