//! # Gossip
//!
//! Best-effort outbound propagation. A freshly mined block fans out to
//! every healthy peer as `POST /receive-new-block`; an admitted
//! transaction fans out to the same peers' `/transaction` endpoint.
//!
//! There are no acknowledgements and no retries here — a peer that
//! misses a broadcast catches up through the sync manager's periodic
//! full-chain pull. Fan-out concurrency is bounded so a large peer
//! table cannot stampede the socket pool, and every request carries the
//! client's per-request timeout.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::chain::{Block, Transaction};
use crate::config::GOSSIP_CONCURRENCY;
use crate::network::client::PeerClient;
use crate::network::peers::PeerSet;

/// Outbound block and transaction broadcaster.
pub struct Gossiper {
    peers: Arc<PeerSet>,
    client: PeerClient,
}

impl Gossiper {
    /// Creates a gossiper over the shared peer table.
    pub fn new(peers: Arc<PeerSet>, client: PeerClient) -> Self {
        Self { peers, client }
    }

    /// Broadcasts a block to all healthy peers. Returns how many
    /// deliveries succeeded.
    pub async fn broadcast_block(&self, block: &Block) -> usize {
        let targets = self.peers.healthy_urls();
        if targets.is_empty() {
            debug!(height = block.index, "no peers to gossip block to");
            return 0;
        }

        let delivered = stream::iter(targets)
            .map(|peer| {
                let client = self.client.clone();
                async move {
                    match client.post_block(&peer, block).await {
                        Ok(()) => {
                            debug!(peer = %peer, height = block.index, "block gossiped");
                            true
                        }
                        Err(e) => {
                            warn!(peer = %peer, error = %e, "block gossip failed");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(GOSSIP_CONCURRENCY)
            .filter(|ok| futures::future::ready(*ok))
            .count()
            .await;

        info!(
            height = block.index,
            delivered,
            peers = self.peers.len(),
            "block broadcast complete"
        );
        delivered
    }

    /// Broadcasts an admitted transaction to all healthy peers. Returns
    /// how many deliveries succeeded.
    pub async fn broadcast_transaction(&self, tx: &Transaction) -> usize {
        let targets = self.peers.healthy_urls();
        if targets.is_empty() {
            return 0;
        }

        let delivered = stream::iter(targets)
            .map(|peer| {
                let client = self.client.clone();
                async move {
                    match client.post_transaction(&peer, tx).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(peer = %peer, error = %e, "transaction gossip failed");
                            false
                        }
                    }
                }
            })
            .buffer_unordered(GOSSIP_CONCURRENCY)
            .filter(|ok| futures::future::ready(*ok))
            .count()
            .await;

        debug!(
            tx = %tx.transaction_id,
            delivered,
            "transaction broadcast complete"
        );
        delivered
    }
}
