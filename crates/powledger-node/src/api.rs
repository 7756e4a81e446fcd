use crate::peer::HttpPeerClient;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use powledger_core::{
    Block, ChainHead, ChainSnapshot, ConflictResolver, Ledger, LedgerError, PendingReceipt,
    Resolution, Transaction,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub resolver: Arc<ConflictResolver<HttpPeerClient>>,
}

impl AppState {
    pub fn new(ledger: Ledger, client: HttpPeerClient) -> Self {
        Self {
            ledger: Arc::new(ledger),
            resolver: Arc::new(ConflictResolver::new(client)),
        }
    }

    pub async fn resolve(&self) -> Result<Resolution, LedgerError> {
        self.resolver.resolve(&self.ledger).await
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/blockchain", get(blockchain))
        .route("/chain/head", get(chain_head))
        .route("/transaction", post(submit_transaction))
        .route("/mine", post(mine))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", post(resolve_conflicts))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RegisterNodes {
    pub nodes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Registered {
    pub added: usize,
    pub peers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Resolved {
    pub replaced: bool,
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
}

impl From<Resolution> for Resolved {
    fn from(resolution: Resolution) -> Self {
        let length = resolution.length();
        match resolution {
            Resolution::Replaced { peer, .. } => Self {
                replaced: true,
                length,
                peer: Some(peer),
            },
            Resolution::Unchanged { .. } => Self {
                replaced: false,
                length,
                peer: None,
            },
        }
    }
}

/// JSON error body with a status code.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::InvalidChain(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::Mining(_) | LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(%err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn blockchain(State(state): State<AppState>) -> Json<ChainSnapshot> {
    Json(state.ledger.snapshot())
}

async fn chain_head(State(state): State<AppState>) -> Json<ChainHead> {
    Json(state.ledger.head())
}

async fn submit_transaction(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> (StatusCode, Json<PendingReceipt>) {
    let receipt = state.ledger.submit_transaction(tx);
    (StatusCode::CREATED, Json(receipt))
}

async fn mine(State(state): State<AppState>) -> Result<Json<Block>, ApiError> {
    let ledger = Arc::clone(&state.ledger);
    let block = tokio::task::spawn_blocking(move || ledger.mine_next())
        .await
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))??;
    Ok(Json(block))
}

async fn register_nodes(
    State(state): State<AppState>,
    Json(body): Json<RegisterNodes>,
) -> Result<Json<Registered>, ApiError> {
    if body.nodes.iter().all(|node| node.trim().is_empty()) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "supply a non-empty list of nodes",
        ));
    }
    let added = body
        .nodes
        .iter()
        .filter(|node| state.ledger.register_peer(node))
        .count();
    info!(added, "registered peers");
    Ok(Json(Registered {
        added,
        peers: state.ledger.peers(),
    }))
}

async fn resolve_conflicts(State(state): State<AppState>) -> Result<Json<Resolved>, ApiError> {
    let resolution = state.resolve().await?;
    Ok(Json(resolution.into()))
}
