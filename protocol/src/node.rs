//! # Node Facade
//!
//! `Node` wires the components — store, chain, mempool, peer set,
//! gossiper, sync manager, miner — and owns the runtime lifecycle.
//! Components never reference each other directly; every cross-component
//! write (submit-and-gossip, receive-and-evict, discover-then-sync) goes
//! through a facade method, which is also where the locking order lives.
//!
//! ## Lifecycle
//!
//! ```text
//! new() -> start() -> [mining / discovery / health / sync tickers] -> stop()
//! ```
//!
//! `start` spawns the background tickers; `stop` aborts them in reverse
//! start order, then flushes the store. The HTTP surface lives in the
//! node binary and calls into this facade.
//!
//! ## Shared state
//!
//! The chain sits behind one coarse `RwLock`; the mempool and peer set
//! synchronize internally. A revision counter bumps on every tip change
//! — the miner's PoW loop watches it for cancellation.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chain::{Block, Chain, Transaction};
use crate::config::{
    NodeConfig, DIFFICULTY_FLOOR, DISCOVERY_BASE_INTERVAL, DISCOVERY_MAX_INTERVAL,
    DISCOVERY_STARTUP_DELAY, HASHRATE_WINDOW, HEALTH_CHECK_INTERVAL, MINER_POLL_INTERVAL,
    PEER_HEALTH_TIMEOUT, SYNC_INTERVAL,
};
use crate::error::NodeError;
use crate::mempool::Mempool;
use crate::miner::{MineOutcome, Miner};
use crate::network::client::PeerClient;
use crate::network::gossip::Gossiper;
use crate::network::peers::{discovery_backoff, is_loopback_url, normalize_url, PeerRecord, PeerSet};
use crate::network::sync::SyncManager;
use crate::store::{Section, Store};

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Point-in-time operational metrics, served on `/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    /// Seconds since `Node::new`.
    pub uptime_secs: u64,
    /// Canonical chain length, genesis included.
    pub total_blocks: u64,
    /// Total on-chain transactions.
    pub total_transactions: usize,
    /// Circulating supply.
    pub total_supply: crate::chain::Amount,
    /// Known peers.
    pub network_nodes: usize,
    /// Pending transactions.
    pub mempool_size: usize,
    /// Current mining difficulty.
    pub difficulty: u32,
    /// Estimated hashes per second over the trailing window.
    pub hashrate: f64,
}

/// Outcome summary of one discovery round, served on
/// `/api/network/discover`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// Seeds that answered the health probe.
    pub healthy_seeds: usize,
    /// Peers newly added this round.
    pub peers_added: usize,
    /// Unhealthy peers pruned this round.
    pub peers_pruned: usize,
    /// Whether the closing sync adopted a longer chain.
    pub sync_updated: bool,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// The assembled Ekehi node.
pub struct Node {
    config: NodeConfig,
    store: Arc<Store>,
    chain: Arc<RwLock<Chain>>,
    mempool: Arc<Mempool>,
    peers: Arc<PeerSet>,
    gossip: Arc<Gossiper>,
    sync: Arc<SyncManager>,
    miner: Arc<Miner>,
    client: PeerClient,
    difficulty: Arc<AtomicU32>,
    revision: Arc<AtomicU64>,
    mining_enabled: AtomicBool,
    started_at: Instant,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl Node {
    /// Builds a node from a config and an opened store, loading any
    /// persisted state. Missing store sections start empty; a corrupt
    /// section is logged and replaced rather than aborting startup.
    pub fn new(
        config: NodeConfig,
        store: Store,
        seeds: Vec<String>,
        own_url: String,
    ) -> Arc<Self> {
        let store = Arc::new(store);

        // -- Chain --
        let chain = match store.load::<Chain>(Section::Chain) {
            Ok(Some(loaded)) => {
                info!(blocks = loaded.len(), "loaded persisted chain");
                loaded
            }
            Ok(None) => {
                info!("no persisted chain, creating genesis");
                Chain::new()
            }
            Err(e) => {
                warn!(error = %e, "persisted chain unreadable, starting from genesis");
                Chain::new()
            }
        };

        // -- Mempool --
        let mempool = Mempool::new();
        match store.load::<Vec<Transaction>>(Section::Mempool) {
            Ok(Some(pending)) => {
                debug!(pending = pending.len(), "loaded persisted mempool");
                mempool.restore(pending);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "persisted mempool unreadable, starting empty"),
        }

        // -- Peers --
        let peers = Arc::new(PeerSet::new(seeds, own_url, config.max_peers));
        match store.load::<Vec<PeerRecord>>(Section::Peers) {
            Ok(Some(records)) => {
                peers.restore(records);
                debug!(peers = peers.len(), "loaded persisted peers");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "persisted peers unreadable, starting empty"),
        }

        // Difficulty follows the loaded tip when it is ahead of config.
        let initial_difficulty = chain
            .tip()
            .difficulty
            .max(config.difficulty)
            .max(DIFFICULTY_FLOOR);

        let chain = Arc::new(RwLock::new(chain));
        let mempool = Arc::new(mempool);
        let difficulty = Arc::new(AtomicU32::new(initial_difficulty));
        let revision = Arc::new(AtomicU64::new(0));
        let client = PeerClient::new();

        let gossip = Arc::new(Gossiper::new(Arc::clone(&peers), client.clone()));
        let sync = Arc::new(SyncManager::new(
            Arc::clone(&chain),
            Arc::clone(&mempool),
            Arc::clone(&peers),
            Arc::clone(&store),
            client.clone(),
            config.clone(),
            Arc::clone(&revision),
            Arc::clone(&difficulty),
        ));
        let miner = Arc::new(Miner::new(
            Arc::clone(&chain),
            Arc::clone(&mempool),
            Arc::clone(&store),
            config.clone(),
            Arc::clone(&difficulty),
            Arc::clone(&revision),
        ));

        // Persist the effective config so the data directory is
        // self-describing.
        if let Err(e) = store.save(Section::Config, &config) {
            warn!(error = %e, "failed to persist node config");
        }

        Arc::new(Self {
            config,
            store,
            chain,
            mempool,
            peers,
            gossip,
            sync,
            miner,
            client,
            difficulty,
            revision,
            mining_enabled: AtomicBool::new(true),
            started_at: Instant::now(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Spawns the background tickers: auto-mining, periodic sync, peer
    /// health monitoring, and seed discovery with backoff.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            warn!("start() called twice, ignoring");
            return;
        }

        info!(
            miner = %self.config.miner_address,
            difficulty = self.current_difficulty(),
            peers = self.peers.len(),
            "starting node workers"
        );

        // Auto-mining scheduler.
        let node = Arc::clone(self);
        tasks.push((
            "miner",
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(MINER_POLL_INTERVAL);
                loop {
                    ticker.tick().await;
                    if !node.mining_enabled.load(Ordering::SeqCst)
                        || node.mempool.is_empty()
                        || node.sync.in_progress()
                    {
                        continue;
                    }
                    let _ = node.mine_now().await;
                }
            }),
        ));

        // Periodic full sync.
        let node = Arc::clone(self);
        tasks.push((
            "sync",
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(SYNC_INTERVAL);
                ticker.tick().await; // immediate tick is discovery's job
                loop {
                    ticker.tick().await;
                    let outcome = node.sync.sync_once().await;
                    debug!(?outcome, "periodic sync finished");
                }
            }),
        ));

        // Peer health monitor.
        let node = Arc::clone(self);
        tasks.push((
            "health",
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    node.health_check_round().await;
                }
            }),
        ));

        // Seed discovery with failure backoff.
        let node = Arc::clone(self);
        tasks.push((
            "discovery",
            tokio::spawn(async move {
                tokio::time::sleep(DISCOVERY_STARTUP_DELAY).await;
                loop {
                    let report = node.run_discovery().await;
                    debug!(?report, "discovery round finished");
                    let delay = discovery_backoff(
                        DISCOVERY_BASE_INTERVAL,
                        node.peers.discovery_failures(),
                        DISCOVERY_MAX_INTERVAL,
                    );
                    tokio::time::sleep(delay).await;
                }
            }),
        ));
    }

    /// Stops the background tickers (reverse start order) and flushes
    /// the store.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock();
        while let Some((name, handle)) = tasks.pop() {
            handle.abort();
            debug!(worker = name, "worker stopped");
        }
        drop(tasks);

        if let Err(e) = self.store.flush() {
            warn!(error = %e, "store flush on shutdown failed");
        }
        info!("node stopped");
    }

    // -- Transactions ---------------------------------------------------------

    /// Admits a transaction into the mempool. Returns the advisory index
    /// of the block it may be included in (mining can include it later).
    pub fn submit_transaction(&self, tx: Transaction) -> Result<u64, NodeError> {
        let next_index = {
            let chain = self.chain.read();
            self.mempool.admit(tx, &chain, &self.config)?;
            chain.next_index()
        };

        self.persist_mempool();
        Ok(next_index)
    }

    /// Admits a transaction and gossips it to all healthy peers.
    pub async fn submit_and_broadcast(&self, tx: Transaction) -> Result<u64, NodeError> {
        let next_index = self.submit_transaction(tx.clone())?;
        self.gossip.broadcast_transaction(&tx).await;
        Ok(next_index)
    }

    // -- Blocks ----------------------------------------------------------------

    /// Inbound single-block append from a peer (`/receive-new-block`).
    ///
    /// Accepts only a direct tip extension that validates completely.
    /// On accept: append, bump the revision (cancelling any in-flight
    /// PoW), evict confirmed transactions, adjust difficulty, persist.
    /// Rejection returns the typed error; deeper fork reconciliation is
    /// left to the sync manager.
    pub fn receive_block(&self, block: Block) -> Result<(), NodeError> {
        let chain_snapshot = {
            let mut chain = self.chain.write();
            chain.validate_incoming(&block, &self.config)?;
            chain.append(block.clone());
            self.revision.fetch_add(1, Ordering::SeqCst);
            self.miner.adjust_after_append(&chain);
            chain.clone()
        };

        let evicted = self.mempool.evict_confirmed(&block);
        info!(
            height = block.index,
            tx_count = block.transactions.len(),
            evicted,
            "accepted block from peer"
        );

        if let Err(e) = self.store.save(Section::Chain, &chain_snapshot) {
            warn!(error = %e, "failed to persist chain after inbound block");
        }
        self.persist_mempool();
        Ok(())
    }

    /// Runs one mining attempt off the async runtime and broadcasts the
    /// result on success.
    pub async fn mine_now(self: &Arc<Self>) -> MineOutcome {
        let miner = Arc::clone(&self.miner);
        let outcome = tokio::task::spawn_blocking(move || miner.mine_once())
            .await
            .unwrap_or(MineOutcome::Cancelled);

        if let MineOutcome::Mined(ref block) = outcome {
            self.gossip.broadcast_block(block).await;
        }
        outcome
    }

    // -- Discovery & health ----------------------------------------------------

    /// One full discovery round, per the four-phase procedure:
    /// seed health checks, registration + second-degree harvest, pruning,
    /// and a closing sync.
    pub async fn run_discovery(&self) -> DiscoveryReport {
        let own = self.peers.own_url();
        let mut healthy_seeds = Vec::new();
        let mut peers_added = 0usize;

        // Phase 1: probe the seeds.
        for seed in self.peers.seeds().to_vec() {
            if seed == own || is_loopback_url(&seed) {
                continue;
            }
            match self.client.get_stats(&seed, PEER_HEALTH_TIMEOUT).await {
                Ok(stats) => {
                    if self.peers.add(&seed) {
                        peers_added += 1;
                    }
                    self.peers
                        .mark_healthy(&seed, stats.total_blocks, stats.difficulty);
                    healthy_seeds.push(seed);
                }
                Err(e) => debug!(seed = %seed, error = %e, "seed unreachable"),
            }
        }

        // Phase 2: register with healthy seeds and harvest their peers.
        for seed in &healthy_seeds {
            if let Err(e) = self.client.register_node(seed, &own).await {
                debug!(seed = %seed, error = %e, "registration failed");
            }

            let candidates = match self.client.get_peers(seed).await {
                Ok(urls) => urls,
                Err(e) => {
                    debug!(seed = %seed, error = %e, "peer harvest failed");
                    continue;
                }
            };

            for candidate in candidates {
                let candidate = normalize_url(&candidate);
                if candidate == own
                    || is_loopback_url(&candidate)
                    || self.peers.urls().contains(&candidate)
                {
                    continue;
                }
                // Quick probe before adoption.
                match self.client.get_stats(&candidate, PEER_HEALTH_TIMEOUT).await {
                    Ok(stats) => {
                        if self.peers.add(&candidate) {
                            self.peers.mark_healthy(
                                &candidate,
                                stats.total_blocks,
                                stats.difficulty,
                            );
                            peers_added += 1;
                        }
                    }
                    Err(e) => debug!(peer = %candidate, error = %e, "candidate unreachable"),
                }
            }
        }

        // Phase 3: drop anything currently flagged unhealthy.
        let pruned = self.peers.prune_unhealthy();

        // Phase 4: one sync pass against the refreshed peer set.
        let sync_outcome = self.sync.sync_once().await;

        self.peers.record_discovery_result(!healthy_seeds.is_empty());
        self.persist_peers();

        DiscoveryReport {
            healthy_seeds: healthy_seeds.len(),
            peers_added,
            peers_pruned: pruned.len(),
            sync_updated: sync_outcome.updated(),
        }
    }

    /// One health-monitor pass over every known peer.
    pub async fn health_check_round(&self) {
        for url in self.peers.urls() {
            match self.client.get_stats(&url, PEER_HEALTH_TIMEOUT).await {
                Ok(stats) => {
                    self.peers
                        .mark_healthy(&url, stats.total_blocks, stats.difficulty)
                }
                Err(_) => {
                    if self.peers.mark_unhealthy(&url) {
                        info!(peer = %url, "peer evicted by health monitor");
                    }
                }
            }
        }
        self.persist_peers();
    }

    // -- Queries ----------------------------------------------------------------

    /// Operational metrics snapshot.
    pub fn stats(&self) -> NodeStats {
        let chain = self.chain.read();
        NodeStats {
            uptime_secs: self.started_at.elapsed().as_secs(),
            total_blocks: chain.len(),
            total_transactions: chain.transaction_count(),
            total_supply: chain.total_supply(),
            network_nodes: self.peers.len(),
            mempool_size: self.mempool.size(),
            difficulty: self.current_difficulty(),
            hashrate: hashrate_estimate(&chain),
        }
    }

    /// Current mining difficulty.
    pub fn current_difficulty(&self) -> u32 {
        self.difficulty.load(Ordering::SeqCst).max(DIFFICULTY_FLOOR)
    }

    /// Enables or disables the auto-mining scheduler.
    pub fn set_mining_enabled(&self, enabled: bool) {
        self.mining_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "auto-mining toggled");
    }

    /// `true` if the auto-mining scheduler is active.
    pub fn is_mining_enabled(&self) -> bool {
        self.mining_enabled.load(Ordering::SeqCst)
    }

    /// Shared chain handle (read access for the HTTP layer).
    pub fn chain(&self) -> &Arc<RwLock<Chain>> {
        &self.chain
    }

    /// The mempool.
    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    /// The peer table.
    pub fn peers(&self) -> &Arc<PeerSet> {
        &self.peers
    }

    /// The sync manager.
    pub fn sync_manager(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    /// The outbound peer client, for HTTP handlers that relay
    /// registrations.
    pub fn peer_client(&self) -> &PeerClient {
        &self.client
    }

    /// The effective node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    // -- Persistence helpers ------------------------------------------------

    fn persist_mempool(&self) {
        if let Err(e) = self.store.save(Section::Mempool, &self.mempool.snapshot()) {
            warn!(error = %e, "failed to persist mempool");
        }
    }

    fn persist_peers(&self) {
        if let Err(e) = self.store.save(Section::Peers, &self.peers.records()) {
            warn!(error = %e, "failed to persist peers");
        }
    }
}

/// Hashrate proxy over the trailing window: Σnonce / Σinterval. Nonce
/// counts approximate hash attempts; intervals are block timestamp
/// deltas. Crude, but meaningful enough for a dashboard.
pub fn hashrate_estimate(chain: &Chain) -> f64 {
    let blocks = chain.blocks();
    if blocks.len() < 2 {
        return 0.0;
    }
    let window_start = blocks.len().saturating_sub(HASHRATE_WINDOW + 1);
    let window = &blocks[window_start..];

    let total_nonce: u64 = window.iter().skip(1).map(|b| b.nonce).sum();
    let interval_ms = window
        .last()
        .map(|b| b.timestamp)
        .unwrap_or(0)
        .saturating_sub(window.first().map(|b| b.timestamp).unwrap_or(0));

    if interval_ms == 0 {
        return total_nonce as f64; // sub-millisecond window, call it per-ms
    }
    total_nonce as f64 / (interval_ms as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Amount;
    use crate::crypto::address::encode_address;

    fn addr(byte: u8) -> String {
        encode_address(&[byte; 20])
    }

    fn test_config() -> NodeConfig {
        NodeConfig {
            difficulty: 1,
            miner_address: addr(77),
            ..NodeConfig::default()
        }
    }

    fn make_node() -> Arc<Node> {
        Node::new(
            test_config(),
            Store::open_temporary().unwrap(),
            vec![],
            "http://self:3000".into(),
        )
    }

    fn faucet_tx(to: u8, ekh: u64) -> Transaction {
        Transaction::new("FAUCET", addr(to), Amount::from_ekh(ekh), Amount::ZERO)
    }

    // -- Fresh node -----------------------------------------------------------

    #[test]
    fn fresh_node_is_genesis_only() {
        let node = make_node();
        let stats = node.stats();
        assert_eq!(stats.total_blocks, 1);
        assert_eq!(stats.total_transactions, 0);
        assert_eq!(stats.total_supply, Amount::ZERO);
        assert_eq!(stats.mempool_size, 0);
        assert!(node.is_mining_enabled());
    }

    // -- Submission -----------------------------------------------------------

    #[test]
    fn submit_returns_advisory_index() {
        let node = make_node();
        let next = node.submit_transaction(faucet_tx(1, 100)).unwrap();
        assert_eq!(next, 2);
        assert_eq!(node.mempool().size(), 1);
    }

    #[test]
    fn submit_rejects_insufficient_balance() {
        let node = make_node();
        let tx = Transaction::new(
            addr(1),
            addr(2),
            Amount::from_ekh(200),
            Amount::from_micro(1_000),
        );
        let err = node.submit_transaction(tx).unwrap_err();
        assert!(matches!(err, NodeError::InsufficientBalance { .. }));
        assert_eq!(node.mempool().size(), 0);
    }

    // -- Mining through the facade --------------------------------------------

    #[tokio::test]
    async fn mine_now_produces_and_records_block() {
        let node = make_node();
        node.submit_transaction(faucet_tx(1, 100)).unwrap();

        let outcome = node.mine_now().await;
        let MineOutcome::Mined(block) = outcome else {
            panic!("expected mined block, got {outcome:?}");
        };

        assert_eq!(block.index, 2);
        let stats = node.stats();
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.mempool_size, 0);
        assert_eq!(
            node.chain().read().balance_of(&addr(1)),
            Amount::from_ekh(100)
        );
    }

    #[tokio::test]
    async fn mine_now_with_empty_mempool() {
        let node = make_node();
        assert_eq!(node.mine_now().await, MineOutcome::EmptyMempool);
    }

    // -- Inbound blocks --------------------------------------------------------

    #[tokio::test]
    async fn receive_block_accepts_valid_extension() {
        // Mine on one node, replay the block into a second.
        let alpha = make_node();
        alpha.submit_transaction(faucet_tx(1, 50)).unwrap();
        let MineOutcome::Mined(block) = alpha.mine_now().await else {
            panic!("expected mined block");
        };

        let beta = make_node();
        // Seed beta's mempool with one of the included transactions to
        // observe eviction.
        beta.submit_transaction(block.transactions[0].clone())
            .unwrap();

        beta.receive_block(block).unwrap();
        assert_eq!(beta.stats().total_blocks, 2);
        assert_eq!(beta.mempool().size(), 0);
    }

    #[test]
    fn receive_block_rejects_unlinked_block() {
        let node = make_node();
        let mut bogus = Block::genesis();
        bogus.index = 2;
        bogus.previous_block_hash = "junk".into();
        bogus.hash = "also-junk".into();
        bogus.difficulty = 1;

        assert!(matches!(
            node.receive_block(bogus),
            Err(NodeError::InvalidBlock(_))
        ));
        assert_eq!(node.stats().total_blocks, 1);
    }

    // -- Persistence across restart --------------------------------------------

    #[tokio::test]
    async fn state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        {
            let node = Node::new(
                test_config(),
                Store::open(dir.path()).unwrap(),
                vec![],
                "http://self:3000".into(),
            );
            node.submit_transaction(faucet_tx(1, 100)).unwrap();
            let MineOutcome::Mined(_) = node.mine_now().await else {
                panic!("expected mined block");
            };
            node.submit_transaction(faucet_tx(2, 5)).unwrap();
            node.stop().await;
        }

        let reborn = Node::new(
            test_config(),
            Store::open(dir.path()).unwrap(),
            vec![],
            "http://self:3000".into(),
        );
        let stats = reborn.stats();
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.mempool_size, 1);
        assert_eq!(
            reborn.chain().read().balance_of(&addr(1)),
            Amount::from_ekh(100)
        );
    }

    // -- Lifecycle --------------------------------------------------------------

    #[tokio::test]
    async fn start_and_stop_cleanly() {
        let node = make_node();
        node.start();
        assert_eq!(node.tasks.lock().len(), 4);
        node.start(); // double start ignored
        assert_eq!(node.tasks.lock().len(), 4);

        node.stop().await;
        assert!(node.tasks.lock().is_empty());
    }

    #[test]
    fn mining_toggle() {
        let node = make_node();
        node.set_mining_enabled(false);
        assert!(!node.is_mining_enabled());
        node.set_mining_enabled(true);
        assert!(node.is_mining_enabled());
    }

    // -- Hashrate ----------------------------------------------------------------

    #[test]
    fn hashrate_zero_for_genesis_only() {
        let node = make_node();
        assert_eq!(hashrate_estimate(&node.chain().read()), 0.0);
    }

    #[tokio::test]
    async fn hashrate_positive_after_mining() {
        let node = make_node();
        for i in 1..=2u8 {
            node.submit_transaction(faucet_tx(i, 10)).unwrap();
            let MineOutcome::Mined(_) = node.mine_now().await else {
                panic!("expected mined block");
            };
        }
        // Nonces are non-negative; with difficulty 1 at least one block
        // almost surely needed a nonzero nonce, but zero is legal —
        // assert non-negativity and finiteness instead of magnitude.
        let rate = hashrate_estimate(&node.chain().read());
        assert!(rate.is_finite());
        assert!(rate >= 0.0);
    }
}
