//! # HTTP API
//!
//! The axum router exposing the node to wallets, explorers, and other
//! nodes. The surface is wire-compatible with the wider Ekehi node
//! family so heterogeneous implementations interoperate.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                        |
//! |--------|-------------------------------|------------------------------------|
//! | GET    | `/blockchain`                 | Full chain + pending transactions  |
//! | GET    | `/stats`                      | Operational statistics             |
//! | POST   | `/receive-new-block`          | Inbound block gossip               |
//! | POST   | `/register-and-broadcast-node`| Peer joins, relayed to the network |
//! | POST   | `/register-node`              | Peer table insert (no relay)       |
//! | POST   | `/register-nodes-bulk`        | Peer table bulk insert             |
//! | POST   | `/transaction`                | Admit a transaction                |
//! | POST   | `/transaction/broadcast`      | Admit + gossip a transaction       |
//! | POST   | `/transaction/send`           | Build, admit, and gossip           |
//! | GET    | `/mine`                       | Mine one block now                 |
//! | POST   | `/mining/start` `/mining/stop`| Toggle the auto-miner              |
//! | GET    | `/mining/status`              | Auto-miner state                   |
//! | GET    | `/block/{hash}`               | Block lookup                       |
//! | GET    | `/transaction/{id}`           | Transaction lookup                 |
//! | GET    | `/address/{addr}`             | Address balance & history          |
//! | GET    | `/api/network/peers`          | Known peer URLs                    |
//! | POST   | `/api/network/discover`       | Run one discovery round            |
//! | POST   | `/wallet/new`                 | Generate a key + address           |
//! | GET    | `/health`                     | Liveness probe                     |
//! | GET    | `/metrics`                    | Prometheus text format             |
//!
//! Failures surface as `{"error": "<kind>", "message": "..."}` with the
//! kind strings from the protocol error taxonomy; 4xx for caller
//! mistakes, 5xx for internal trouble.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ekehi_protocol::chain::AddressData;
use ekehi_protocol::config::{NETWORK_NAME, TOKEN_NAME, TOKEN_SYMBOL};
use ekehi_protocol::crypto::address::validate_address;
use ekehi_protocol::crypto::wallet::Wallet;
use ekehi_protocol::miner::MineOutcome;
use ekehi_protocol::node::Node;
use ekehi_protocol::{Amount, Block, NodeError, Transaction};

use crate::metrics::{metrics_handler, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for all request handlers. Cheap to clone — everything
/// is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The assembled protocol node.
    pub node: Arc<Node>,
    /// Prometheus metric handles.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Wraps a protocol error for HTTP serialization.
pub struct ApiError(pub NodeError);

/// HTTP status for each error kind.
fn status_for(err: &NodeError) -> StatusCode {
    match err {
        NodeError::DuplicateTransaction(_) => StatusCode::CONFLICT,
        NodeError::PeerUnreachable(_) => StatusCode::BAD_GATEWAY,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        Self(err)
    }
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockchainResponse {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    difficulty: u32,
    network_name: &'static str,
    token_name: &'static str,
    token_symbol: &'static str,
    mining_reward: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiveBlockRequest {
    new_block: Block,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterNodeRequest {
    new_node_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBulkRequest {
    #[serde(default)]
    all_network_nodes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendTransactionRequest {
    amount: Amount,
    sender: String,
    recipient: String,
    fee: Option<Amount>,
    network: Option<String>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/blockchain", get(blockchain_handler))
        .route("/stats", get(stats_handler))
        .route("/receive-new-block", post(receive_block_handler))
        .route("/register-and-broadcast-node", post(register_broadcast_handler))
        .route("/register-node", post(register_node_handler))
        .route("/register-nodes-bulk", post(register_bulk_handler))
        .route("/transaction", post(transaction_handler))
        .route("/transaction/broadcast", post(transaction_broadcast_handler))
        .route("/transaction/send", post(transaction_send_handler))
        .route("/mine", get(mine_handler))
        .route("/mining/start", post(mining_start_handler))
        .route("/mining/stop", post(mining_stop_handler))
        .route("/mining/status", get(mining_status_handler))
        .route("/block/{hash}", get(block_by_hash_handler))
        .route("/transaction/{id}", get(transaction_by_id_handler))
        .route("/address/{addr}", get(address_handler))
        .route("/api/network/peers", get(network_peers_handler))
        .route("/api/network/discover", post(discover_handler))
        .route("/wallet/new", post(wallet_new_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Chain & Stats
// ---------------------------------------------------------------------------

/// `GET /blockchain` — the full chain snapshot peers sync from.
async fn blockchain_handler(State(state): State<AppState>) -> impl IntoResponse {
    let chain = state.node.chain().read().blocks().to_vec();
    Json(BlockchainResponse {
        chain,
        pending_transactions: state.node.mempool().snapshot(),
        difficulty: state.node.current_difficulty(),
        network_name: NETWORK_NAME,
        token_name: TOKEN_NAME,
        token_symbol: TOKEN_SYMBOL,
        mining_reward: state.node.config().mining_reward,
    })
}

/// `GET /stats` — operational statistics.
async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.node.stats())
}

/// `GET /health` — liveness probe for orchestrators. Intentionally does
/// not inspect subsystem health; that belongs in `/stats`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// `POST /receive-new-block` — inbound gossip. Always answers 200 with
/// a note; rejection details go to the structured log, not the peer.
async fn receive_block_handler(
    State(state): State<AppState>,
    Json(req): Json<ReceiveBlockRequest>,
) -> impl IntoResponse {
    let block = req.new_block;
    match state.node.receive_block(block.clone()) {
        Ok(()) => {
            state.metrics.blocks_received_total.inc();
            Json(serde_json::json!({
                "note": "Block accepted.",
                "newBlock": block,
            }))
        }
        Err(e) => {
            tracing::warn!(height = block.index, error = %e, "rejected inbound block");
            Json(serde_json::json!({
                "note": "Block rejected.",
                "newBlock": block,
            }))
        }
    }
}

/// `GET /block/{hash}` — block lookup by hex hash.
async fn block_by_hash_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Response {
    match state.node.chain().read().block_by_hash(&hash) {
        Some(block) => Json(serde_json::json!({ "block": block })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "not_found",
                "message": format!("no block with hash {hash}"),
            })),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Mining
// ---------------------------------------------------------------------------

/// `GET /mine` — mine one block immediately and broadcast it.
async fn mine_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.node.mine_now().await {
        MineOutcome::Mined(block) => {
            state.metrics.blocks_mined_total.inc();
            Json(serde_json::json!({
                "note": "New block mined successfully.",
                "block": block,
            }))
        }
        MineOutcome::EmptyMempool => Json(serde_json::json!({
            "note": "No pending transactions to mine.",
        })),
        MineOutcome::AlreadyMining => Json(serde_json::json!({
            "note": "Mining already in progress.",
        })),
        MineOutcome::Cancelled => Json(serde_json::json!({
            "note": "Mining cancelled by a tip change.",
        })),
    }
}

/// `POST /mining/start` — enable the auto-mining scheduler.
async fn mining_start_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.node.set_mining_enabled(true);
    Json(serde_json::json!({ "note": "Auto-mining enabled.", "mining": true }))
}

/// `POST /mining/stop` — disable the auto-mining scheduler.
async fn mining_stop_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.node.set_mining_enabled(false);
    Json(serde_json::json!({ "note": "Auto-mining disabled.", "mining": false }))
}

/// `GET /mining/status` — current miner state.
async fn mining_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.node.stats();
    Json(serde_json::json!({
        "mining": state.node.is_mining_enabled(),
        "difficulty": stats.difficulty,
        "hashrate": stats.hashrate,
        "mempoolSize": stats.mempool_size,
    }))
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// `POST /transaction` — admit a fully formed transaction (the
/// peer-forwarding path).
async fn transaction_handler(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> Result<impl IntoResponse, ApiError> {
    let block_index = state.node.submit_transaction(tx)?;
    state.metrics.transactions_admitted_total.inc();
    Ok(Json(serde_json::json!({
        "note": format!("Transaction will be added in block {block_index}."),
        "blockIndex": block_index,
    })))
}

/// `POST /transaction/broadcast` — admit and gossip to all peers.
async fn transaction_broadcast_handler(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> Result<impl IntoResponse, ApiError> {
    let block_index = state.node.submit_and_broadcast(tx).await?;
    state.metrics.transactions_admitted_total.inc();
    Ok(Json(serde_json::json!({
        "note": format!("Transaction broadcast, expected in block {block_index}."),
        "blockIndex": block_index,
    })))
}

/// `POST /transaction/send` — build a transaction from parts, then
/// admit and gossip it. The convenience path wallets use.
async fn transaction_send_handler(
    State(state): State<AppState>,
    Json(req): Json<SendTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Default fee: the floor for ordinary senders, zero for reserved.
    let fee = req.fee.unwrap_or_else(|| {
        if ekehi_protocol::crypto::address::is_reserved_sender(&req.sender) {
            Amount::ZERO
        } else {
            state.node.config().min_fee
        }
    });

    let mut tx = Transaction::new(req.sender, req.recipient, req.amount, fee);
    tx.network = req.network;

    let block_index = state.node.submit_and_broadcast(tx.clone()).await?;
    state.metrics.transactions_admitted_total.inc();
    Ok(Json(serde_json::json!({
        "note": format!("Transaction created and broadcast, expected in block {block_index}."),
        "transaction": tx,
        "blockIndex": block_index,
    })))
}

/// `GET /transaction/{id}` — transaction lookup with containing block.
async fn transaction_by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let chain = state.node.chain().read();
    match chain.transaction_by_id(&id) {
        Some((tx, block)) => Json(serde_json::json!({
            "transaction": tx,
            "block": { "index": block.index, "hash": block.hash },
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "not_found",
                "message": format!("no transaction with id {id}"),
            })),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Addresses & Wallets
// ---------------------------------------------------------------------------

/// `GET /address/{addr}` — balance and history for an address.
async fn address_handler(
    State(state): State<AppState>,
    Path(addr): Path<String>,
) -> Result<Json<AddressData>, ApiError> {
    if !validate_address(&addr) {
        return Err(NodeError::InvalidAddress(format!("{addr:?} is not a valid address")).into());
    }
    Ok(Json(state.node.chain().read().address_data(&addr)))
}

/// `POST /wallet/new` — generate a private key and its address. The key
/// is returned once and never stored.
async fn wallet_new_handler() -> impl IntoResponse {
    Json(Wallet::generate())
}

// ---------------------------------------------------------------------------
// Peers & Discovery
// ---------------------------------------------------------------------------

/// `POST /register-and-broadcast-node` — a node joins: register it,
/// relay the registration to every existing peer, then hand the joiner
/// our full peer table.
async fn register_broadcast_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterNodeRequest>,
) -> impl IntoResponse {
    let new_url = req.new_node_url;
    let added = state.node.peers().add(&new_url);

    // Relay to the rest of the network (best effort, skip the joiner).
    let client = state.node.peer_client().clone();
    for peer in state.node.peers().urls() {
        if peer == new_url {
            continue;
        }
        if let Err(e) = client.register_node_quiet(&peer, &new_url).await {
            tracing::debug!(peer = %peer, error = %e, "registration relay failed");
        }
    }

    // Hand the joiner everything we know, ourselves included.
    let mut known = state.node.peers().urls();
    known.push(state.node.peers().own_url());
    if let Err(e) = client.register_nodes_bulk(&new_url, &known).await {
        tracing::debug!(peer = %new_url, error = %e, "bulk registration failed");
    }

    Json(serde_json::json!({
        "note": "New node registered with network.",
        "added": added,
    }))
}

/// `POST /register-node` — plain peer table insert.
async fn register_node_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterNodeRequest>,
) -> impl IntoResponse {
    let added = state.node.peers().add(&req.new_node_url);
    Json(serde_json::json!({
        "note": if added { "Node registered." } else { "Node not added." },
        "added": added,
    }))
}

/// `POST /register-nodes-bulk` — accept a peer table from an existing
/// network member.
async fn register_bulk_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterBulkRequest>,
) -> impl IntoResponse {
    let mut added = 0usize;
    for url in &req.all_network_nodes {
        if state.node.peers().add(url) {
            added += 1;
        }
    }
    Json(serde_json::json!({
        "note": "Bulk registration processed.",
        "added": added,
    }))
}

/// `GET /api/network/peers` — the peer URLs this node knows.
async fn network_peers_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "networkNodes": state.node.peers().urls(),
        "ownUrl": state.node.peers().own_url(),
    }))
}

/// `POST /api/network/discover` — run one discovery round now.
async fn discover_handler(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.node.run_discovery().await;
    if report.sync_updated {
        state.metrics.chain_adoptions_total.inc();
    }
    Json(report)
}
