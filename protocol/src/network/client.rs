//! # Peer HTTP Client
//!
//! Thin JSON client for everything this node asks of its peers. Every
//! request carries an explicit timeout — the node never waits
//! synchronously on a single peer — and every failure collapses into
//! [`NodeError::PeerUnreachable`] so callers can treat "slow", "down",
//! and "talking garbage" identically: skip the peer, move on.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chain::{Block, Transaction};
use crate::config::PEER_REQUEST_TIMEOUT;
use crate::error::NodeError;

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

/// A peer's full chain snapshot, as served on `GET /blockchain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteChain {
    /// The peer's canonical chain, genesis first.
    pub chain: Vec<Block>,
    /// The peer's pending transactions.
    #[serde(default)]
    pub pending_transactions: Vec<Transaction>,
    /// The peer's currently declared mining difficulty.
    #[serde(default)]
    pub difficulty: u32,
}

/// A peer's `GET /stats` summary. All fields default — the probe only
/// needs the response to parse, not to be complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteStats {
    pub total_blocks: u64,
    pub network_nodes: u64,
    pub difficulty: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterNodeBody<'a> {
    new_node_url: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiveBlockBody<'a> {
    new_block: &'a Block,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkRegisterBody<'a> {
    all_network_nodes: &'a [String],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerListResponse {
    #[serde(default)]
    network_nodes: Vec<String>,
}

// ---------------------------------------------------------------------------
// PeerClient
// ---------------------------------------------------------------------------

/// JSON-over-HTTP client for peer RPCs.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl Default for PeerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerClient {
    /// Builds a client with the standard per-request timeout.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(PEER_REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static configuration");
        Self { http }
    }

    fn unreachable(url: &str, err: impl std::fmt::Display) -> NodeError {
        NodeError::PeerUnreachable(format!("{url}: {err}"))
    }

    /// `GET {peer}/stats` with a caller-chosen timeout. This doubles as
    /// the health probe, which uses a tighter deadline than ordinary RPCs.
    pub async fn get_stats(&self, peer: &str, timeout: Duration) -> Result<RemoteStats, NodeError> {
        let url = format!("{peer}/stats");
        let resp = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unreachable(peer, e))?;
        resp.json().await.map_err(|e| Self::unreachable(peer, e))
    }

    /// `GET {peer}/blockchain` — the full-chain download used by sync.
    pub async fn get_blockchain(&self, peer: &str) -> Result<RemoteChain, NodeError> {
        let url = format!("{peer}/blockchain");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unreachable(peer, e))?;
        resp.json().await.map_err(|e| Self::unreachable(peer, e))
    }

    /// `GET {peer}/api/network/peers` — harvest second-degree peers.
    pub async fn get_peers(&self, peer: &str) -> Result<Vec<String>, NodeError> {
        let url = format!("{peer}/api/network/peers");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unreachable(peer, e))?;
        let list: PeerListResponse = resp.json().await.map_err(|e| Self::unreachable(peer, e))?;
        Ok(list.network_nodes)
    }

    /// `POST {peer}/receive-new-block` — push a freshly mined block.
    pub async fn post_block(&self, peer: &str, block: &Block) -> Result<(), NodeError> {
        let url = format!("{peer}/receive-new-block");
        self.http
            .post(&url)
            .json(&ReceiveBlockBody { new_block: block })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unreachable(peer, e))?;
        Ok(())
    }

    /// `POST {peer}/transaction` — forward an admitted transaction.
    pub async fn post_transaction(&self, peer: &str, tx: &Transaction) -> Result<(), NodeError> {
        let url = format!("{peer}/transaction");
        self.http
            .post(&url)
            .json(tx)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unreachable(peer, e))?;
        Ok(())
    }

    /// `POST {peer}/register-and-broadcast-node` — announce ourselves.
    pub async fn register_node(&self, peer: &str, own_url: &str) -> Result<(), NodeError> {
        let url = format!("{peer}/register-and-broadcast-node");
        self.http
            .post(&url)
            .json(&RegisterNodeBody { new_node_url: own_url })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unreachable(peer, e))?;
        Ok(())
    }

    /// `POST {peer}/register-node` — plain registration without the
    /// receiving node re-broadcasting.
    pub async fn register_node_quiet(&self, peer: &str, node_url: &str) -> Result<(), NodeError> {
        let url = format!("{peer}/register-node");
        self.http
            .post(&url)
            .json(&RegisterNodeBody { new_node_url: node_url })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unreachable(peer, e))?;
        Ok(())
    }

    /// `POST {peer}/register-nodes-bulk` — hand a freshly joined node
    /// the full peer table in one shot.
    pub async fn register_nodes_bulk(&self, peer: &str, urls: &[String]) -> Result<(), NodeError> {
        let url = format!("{peer}/register-nodes-bulk");
        self.http
            .post(&url)
            .json(&BulkRegisterBody {
                all_network_nodes: urls,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::unreachable(peer, e))?;
        Ok(())
    }
}
