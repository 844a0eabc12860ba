use crate::{peers, AppState, CancelOnDrop};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{chain::ChainError, parse_candidate, Block, Payload, ReplaceError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::Ordering;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Tip {
    pub height: u64,
    pub hash: String,
    pub difficulty: u32,
}

#[derive(Deserialize)]
pub struct MineRequest {
    #[serde(default)]
    pub data: Payload,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/api/blocks", get(blocks))
        .route("/api/blocks/tip", get(tip))
        .route("/api/mine", post(mine))
        .route("/api/chain", post(replace))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn blocks(State(state): State<AppState>) -> Json<Vec<Block>> {
    Json(state.blocks().as_ref().clone())
}

async fn tip(State(state): State<AppState>) -> Json<Tip> {
    let blocks = state.blocks();
    // The snapshot always holds at least genesis.
    let (height, last) = match blocks.last() {
        Some(last) => (blocks.len() as u64 - 1, last.clone()),
        None => (0, Block::genesis()),
    };
    Json(Tip {
        height,
        hash: last.hash,
        difficulty: last.difficulty,
    })
}

async fn mine(
    State(state): State<AppState>,
    Json(req): Json<MineRequest>,
) -> Result<(StatusCode, Json<Block>), ApiError> {
    // Held across the mine so no replacement can slip in under us.
    let mut chain = state.chain.lock().await;
    let last = chain.ledger().last_block().clone();
    let shutdown = state.cancel.clone();
    let (_abandon_on_drop, abandoned) = CancelOnDrop::new();

    let mined = tokio::task::spawn_blocking(move || {
        Block::mine_block_cancellable(&last, req.data, || {
            shutdown.load(Ordering::Relaxed) || abandoned.load(Ordering::Relaxed)
        })
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))?;
    let block = mined.ok_or(ApiError::Cancelled)?;

    chain.append_block(block.clone())?;
    info!(height = chain.height(), hash = %block.hash, difficulty = block.difficulty, "mined block");
    let snapshot = state.publish(&chain);
    drop(chain);

    peers::broadcast(&state, snapshot.as_ref().clone());
    Ok((StatusCode::CREATED, Json(block)))
}

async fn replace(State(state): State<AppState>, body: Bytes) -> Result<Json<serde_json::Value>, ApiError> {
    let candidate = serde_json::from_slice(&body)
        .map_err(|e| ValidationError::Malformed(e.to_string()))
        .and_then(parse_candidate)
        .map_err(|e| ApiError::from(ChainError::Rejected(e.into())))?;

    let mut chain = state.chain.lock().await;
    chain.replace_chain(candidate)?;
    state.publish(&chain);
    Ok(Json(json!({ "accepted": true, "height": chain.height() })))
}

/// Log a rejected candidate: length at warn, validity at error.
pub fn report_rejection(source: &str, err: &ReplaceError) {
    match err {
        ReplaceError::TooShort { candidate, current } => {
            warn!(source, candidate, current, "incoming chain must be longer")
        }
        ReplaceError::Invalid(reason) => {
            error!(source, %reason, "incoming chain must be valid")
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    Cancelled,
    Internal(anyhow::Error),
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Store(e) => ApiError::Internal(e),
            other => ApiError::Chain(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Chain(ChainError::Rejected(err)) => {
                report_rejection("api", &err);
                match err {
                    ReplaceError::TooShort { candidate, current } => (
                        StatusCode::CONFLICT,
                        json!({
                            "accepted": false,
                            "reason": "too_short",
                            "candidate": candidate,
                            "current": current,
                        }),
                    ),
                    ReplaceError::Invalid(reason) => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        json!({
                            "accepted": false,
                            "reason": "invalid",
                            "detail": reason.to_string(),
                        }),
                    ),
                }
            }
            ApiError::Chain(other) => {
                error!(error = %other, "mined block refused");
                (StatusCode::CONFLICT, json!({ "error": other.to_string() }))
            }
            ApiError::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "mining cancelled, node is shutting down" }),
            ),
            ApiError::Internal(e) => {
                error!(error = %format!("{e:#}"), "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
