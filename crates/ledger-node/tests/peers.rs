use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use ledger_core::chain::{Chain, ChainStore};
use ledger_core::ReplaceError;
use ledger_node::peers::{self, SyncOutcome};
use ledger_node::{api, AppState};
use ledger_storage::SledStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;
use tower::ServiceExt;

fn node(peers: Vec<String>) -> (TempDir, AppState) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = Arc::new(SledStore::open(temp_dir.path()).expect("Failed to open SledStore"));
    let chain = Chain::open(store).expect("Failed to open chain");
    (temp_dir, AppState::new(chain, peers))
}

/// Serve `state` on an ephemeral local port and return its base URL.
async fn serve(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, api::router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn mine_locally(state: &AppState, blocks: usize) {
    let mut chain = state.chain.lock().await;
    for i in 0..blocks {
        chain.add_block(json!({ "seq": i })).unwrap();
    }
    state.publish(&chain);
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_chain_reads_a_peer() {
    let (_a_dir, a) = node(Vec::new());
    mine_locally(&a, 2).await;
    let a_url = serve(a.clone()).await;

    let fetched = peers::fetch_chain(&a.client, &a_url).await.unwrap();
    assert_eq!(fetched, *a.blocks());
}

#[tokio::test(flavor = "multi_thread")]
async fn join_adopts_longer_peer_chain() {
    let (_a_dir, a) = node(Vec::new());
    mine_locally(&a, 3).await;
    let a_url = serve(a.clone()).await;

    let (_b_dir, b) = node(vec![a_url.clone()]);
    match peers::sync_on_join(&b).await.unwrap() {
        SyncOutcome::Adopted { peer, height } => {
            assert_eq!(peer, a_url);
            assert_eq!(height, 3);
        }
        other => panic!("expected adoption, got {other:?}"),
    }

    assert_eq!(b.blocks(), a.blocks());
    let chain = b.chain.lock().await;
    assert_eq!(chain.store().load_chain().unwrap(), *a.blocks());
}

#[tokio::test(flavor = "multi_thread")]
async fn join_keeps_own_chain_when_peer_is_not_longer() {
    let (_a_dir, a) = node(Vec::new());
    mine_locally(&a, 1).await;
    let a_url = serve(a).await;

    let (_b_dir, b) = node(vec![a_url]);
    mine_locally(&b, 2).await;
    let before = b.blocks();

    let outcome = peers::sync_on_join(&b).await.unwrap();
    assert!(matches!(
        outcome,
        SyncOutcome::Rejected {
            reason: ReplaceError::TooShort { candidate: 2, current: 3 },
            ..
        }
    ));
    assert_eq!(b.blocks(), before);
    assert_eq!(b.chain.lock().await.ledger().chain(), before.as_slice());
}

#[tokio::test(flavor = "multi_thread")]
async fn join_skips_unreachable_peers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (_b_dir, b) = node(vec![dead]);
    let outcome = peers::sync_on_join(&b).await.unwrap();
    assert!(matches!(outcome, SyncOutcome::NoPeerReachable));
    assert_eq!(b.blocks().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn mined_block_reaches_peer() {
    let (_a_dir, a) = node(Vec::new());
    let a_url = serve(a.clone()).await;

    let (_b_dir, b) = node(vec![a_url]);
    let req = Request::post("/api/mine")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "data": "ed" }).to_string()))
        .unwrap();
    let res = api::router(b.clone()).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let mut received = false;
    for _ in 0..50 {
        if a.blocks().len() == 2 {
            received = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(received, "broadcast never reached the peer");
    assert_eq!(a.blocks(), b.blocks());
}
