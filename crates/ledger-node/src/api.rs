use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::wire::{
    BalanceResponse, ChainResponse, Health, MessageResponse, MineRequest, MineResponse,
    TransactionRequest,
};
use ledger_core::{AuthorityConfig, Block, ChainStore, LedgerError, MiningAuthority};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::config::NodeConfig;

const MINE_FIELDS_REQUIRED: &str = "Request body must have id and proof";
const TX_FIELDS_REQUIRED: &str = "Error Missing values";

#[derive(Clone)]
pub struct AppState {
    authority: Arc<MiningAuthority<dyn ChainStore>>,
}

impl AppState {
    pub fn new(authority: Arc<MiningAuthority<dyn ChainStore>>) -> Self {
        Self { authority }
    }

    pub fn from_store(store: Arc<dyn ChainStore>, config: AuthorityConfig) -> anyhow::Result<Self> {
        let authority = MiningAuthority::open(store, config)?;
        Ok(Self::new(Arc::new(authority)))
    }

    pub fn open(config: &NodeConfig) -> anyhow::Result<Self> {
        Self::from_store(config.open_store()?, config.authority_config())
    }

    pub fn authority(&self) -> &MiningAuthority<dyn ChainStore> {
        &self.authority
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Malformed(&'static str),
    #[error("Unable to forge block!")]
    Rejected,
    /// Details go to the log, never to the client.
    #[error("Internal server error")]
    Internal,
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidProof { .. } => ApiError::Rejected,
            other => {
                error!("ledger error: {other:#}");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Malformed(_) | ApiError::Rejected => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = MessageResponse {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/last_block", get(last_block))
        .route("/chain", get(full_chain))
        .route("/mine", post(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/balance/{id}", get(balance))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

/// Runs `f` against the authority on the blocking pool. The chain lock can be
/// held across a store flush, so no handler touches it on a runtime worker.
async fn with_authority<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&MiningAuthority<dyn ChainStore>) -> T + Send + 'static,
    T: Send + 'static,
{
    let authority = Arc::clone(&state.authority);
    tokio::task::spawn_blocking(move || f(&authority))
        .await
        .map_err(|err| {
            error!("authority task failed: {err}");
            ApiError::Internal
        })
}

async fn last_block(State(state): State<AppState>) -> Result<Json<Block>, ApiError> {
    let block = with_authority(&state, |authority| authority.last_block()).await??;
    Ok(Json(block))
}

async fn full_chain(State(state): State<AppState>) -> Result<Json<ChainResponse>, ApiError> {
    let chain = with_authority(&state, |authority| authority.blocks()).await?;
    Ok(Json(ChainResponse {
        length: chain.len(),
        chain,
    }))
}

async fn mine(
    State(state): State<AppState>,
    payload: Result<Json<MineRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MineResponse>), ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!("unreadable /mine body: {rejection}");
        ApiError::Malformed(MINE_FIELDS_REQUIRED)
    })?;
    let (Some(id), Some(proof)) = (req.id, req.proof) else {
        return Err(ApiError::Malformed(MINE_FIELDS_REQUIRED));
    };
    if id.trim().is_empty() {
        return Err(ApiError::Malformed(MINE_FIELDS_REQUIRED));
    }

    let block = with_authority(&state, move |authority| authority.submit_proof(&id, proof)).await??;
    Ok((StatusCode::CREATED, Json(MineResponse::forged(block))))
}

async fn new_transaction(
    State(state): State<AppState>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!("unreadable /transactions/new body: {rejection}");
        ApiError::Malformed(TX_FIELDS_REQUIRED)
    })?;
    let (Some(sender), Some(recipient), Some(amount)) = (req.sender, req.recipient, req.amount)
    else {
        return Err(ApiError::Malformed(TX_FIELDS_REQUIRED));
    };

    let index = with_authority(&state, move |authority| {
        authority.submit_transaction(sender, recipient, amount)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to Block {index}"),
        }),
    ))
}

async fn balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let (id, balance) = with_authority(&state, move |authority| {
        let balance = authority.balance_of(&id);
        (id, balance)
    })
    .await?;
    Ok(Json(BalanceResponse { id, balance }))
}
