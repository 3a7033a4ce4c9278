//! # Miner
//!
//! Proof-of-work block production. The pipeline per attempt:
//!
//! ```text
//! 1. SNAPSHOT — tip hash + next index under a read lock
//! 2. SELECT   — pending transactions in admission order
//! 3. COINBASE — append the reward transaction (always last)
//! 4. SEARCH   — increment nonce until the hash meets difficulty
//! 5. COMMIT   — re-check the tip, append, evict, persist
//! 6. ADJUST   — steer difficulty toward the target interval
//! ```
//!
//! ## Cancellation
//!
//! The nonce search is CPU-bound and can run for a long time at higher
//! difficulties. It checks a shared revision counter every
//! [`POW_CANCEL_CHECK_INTERVAL`] hashes; any tip change (inbound block,
//! chain adoption) bumps the counter and the search aborts within a
//! bounded number of hashes. A cancelled candidate is simply discarded —
//! the mempool was only read, never drained, so nothing is lost.
//!
//! The commit step re-validates that the tip still matches the snapshot
//! under the write lock, closing the race between "search finished" and
//! "someone else extended the chain first".

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::chain::block::{compute_block_hash, sum_fees};
use crate::chain::transaction::now_ms;
use crate::chain::{Block, Chain, Transaction};
use crate::config::{NodeConfig, DIFFICULTY_FLOOR, POW_CANCEL_CHECK_INTERVAL};
use crate::crypto::hash::meets_difficulty;
use crate::mempool::Mempool;
use crate::store::{Section, Store};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of one mining attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum MineOutcome {
    /// A block was sealed and appended. Broadcast it.
    Mined(Block),
    /// Nothing pending; no block produced.
    EmptyMempool,
    /// The tip changed mid-search; candidate discarded.
    Cancelled,
    /// Another attempt is already running.
    AlreadyMining,
}

// ---------------------------------------------------------------------------
// Pure pieces
// ---------------------------------------------------------------------------

/// Brute-force nonce search. Returns `(nonce, hash)` on success or
/// `None` if `should_cancel` fired first.
pub fn proof_of_work(
    previous_block_hash: &str,
    transactions: &[Transaction],
    index: u64,
    difficulty: u32,
    should_cancel: impl Fn() -> bool,
) -> Option<(u64, String)> {
    let mut nonce: u64 = 0;
    loop {
        if nonce % POW_CANCEL_CHECK_INTERVAL == 0 && should_cancel() {
            return None;
        }
        let hash = compute_block_hash(previous_block_hash, nonce, transactions, index);
        if meets_difficulty(&hash, difficulty) {
            return Some((nonce, hash));
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// One-step difficulty adjustment, ±1 per block with a floor.
///
/// Blocks arriving in under half the target interval raise difficulty;
/// blocks taking over twice the target lower it.
pub fn adjust_difficulty(
    current: u32,
    tip_timestamp: u64,
    predecessor_timestamp: u64,
    target_interval_ms: u64,
) -> u32 {
    let interval = tip_timestamp.saturating_sub(predecessor_timestamp);
    if interval < target_interval_ms / 2 {
        current + 1
    } else if interval > target_interval_ms.saturating_mul(2) {
        current.saturating_sub(1).max(DIFFICULTY_FLOOR)
    } else {
        current.max(DIFFICULTY_FLOOR)
    }
}

// ---------------------------------------------------------------------------
// Miner
// ---------------------------------------------------------------------------

/// Seals blocks over the shared chain state.
pub struct Miner {
    chain: Arc<RwLock<Chain>>,
    mempool: Arc<Mempool>,
    store: Arc<Store>,
    config: NodeConfig,
    /// Current difficulty, shared with the sync manager.
    difficulty: Arc<AtomicU32>,
    /// Tip-change counter, shared with every other chain writer.
    revision: Arc<AtomicU64>,
    /// Guards against concurrent attempts from overlapping scheduler ticks.
    mining: AtomicBool,
}

struct MiningGuard<'a>(&'a AtomicBool);

impl Drop for MiningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Miner {
    pub fn new(
        chain: Arc<RwLock<Chain>>,
        mempool: Arc<Mempool>,
        store: Arc<Store>,
        config: NodeConfig,
        difficulty: Arc<AtomicU32>,
        revision: Arc<AtomicU64>,
    ) -> Self {
        Self {
            chain,
            mempool,
            store,
            config,
            difficulty,
            revision,
            mining: AtomicBool::new(false),
        }
    }

    /// Current difficulty as seen by the miner.
    pub fn current_difficulty(&self) -> u32 {
        self.difficulty.load(Ordering::SeqCst).max(DIFFICULTY_FLOOR)
    }

    /// Runs one full mining attempt. CPU-bound — call from a blocking
    /// context (`tokio::task::spawn_blocking`), never on the async
    /// runtime directly.
    pub fn mine_once(&self) -> MineOutcome {
        if self
            .mining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return MineOutcome::AlreadyMining;
        }
        let _guard = MiningGuard(&self.mining);

        let observed_revision = self.revision.load(Ordering::SeqCst);

        // 1. SNAPSHOT.
        let (previous_block_hash, index) = {
            let chain = self.chain.read();
            (chain.tip().hash.clone(), chain.next_index())
        };

        // 2. SELECT. Leave one slot for the coinbase.
        let capacity = self.config.max_transactions_per_block.saturating_sub(1);
        let mut transactions = self.mempool.take(capacity);
        if transactions.is_empty() {
            return MineOutcome::EmptyMempool;
        }

        // 3. COINBASE, sealed together with the selected transactions so
        // the block hash covers the full sequence.
        transactions.push(Transaction::coinbase(
            self.config.miner_address.clone(),
            self.config.mining_reward,
        ));

        let difficulty = self.current_difficulty();
        debug!(
            index,
            difficulty,
            candidates = transactions.len(),
            "starting proof-of-work"
        );

        // 4. SEARCH.
        let revision = Arc::clone(&self.revision);
        let cancelled = move || revision.load(Ordering::SeqCst) != observed_revision;
        let Some((nonce, hash)) =
            proof_of_work(&previous_block_hash, &transactions, index, difficulty, cancelled)
        else {
            debug!(index, "proof-of-work cancelled by tip change");
            return MineOutcome::Cancelled;
        };

        let total_fees = match sum_fees(&transactions) {
            Some(fees) => fees,
            None => {
                // Unreachable for admitted transactions; bail rather than
                // seal a block our own validator would reject.
                warn!(index, "fee sum overflow while assembling block");
                return MineOutcome::Cancelled;
            }
        };

        let block = Block {
            index,
            timestamp: now_ms(),
            transactions,
            nonce,
            hash,
            previous_block_hash: previous_block_hash.clone(),
            difficulty,
            total_fees,
        };

        // 5. COMMIT. Re-check the tip under the write lock — a block may
        // have landed while we were hashing and the revision check can
        // race with the final hash attempts.
        let chain_snapshot = {
            let mut chain = self.chain.write();
            if chain.tip().hash != previous_block_hash
                || self.revision.load(Ordering::SeqCst) != observed_revision
            {
                debug!(index, "tip moved before commit, discarding candidate");
                return MineOutcome::Cancelled;
            }

            chain.append(block.clone());
            self.revision.fetch_add(1, Ordering::SeqCst);

            // 6. ADJUST, from the two newest timestamps.
            let blocks = chain.blocks();
            if blocks.len() >= 2 {
                let tip = &blocks[blocks.len() - 1];
                let prev = &blocks[blocks.len() - 2];
                let next = adjust_difficulty(
                    difficulty,
                    tip.timestamp,
                    prev.timestamp,
                    self.config.target_block_interval_ms,
                );
                if next != difficulty {
                    info!(from = difficulty, to = next, "difficulty adjusted");
                }
                self.difficulty.store(next, Ordering::SeqCst);
            }

            chain.clone()
        };

        let evicted = self.mempool.evict_confirmed(&block);

        // Best-effort persistence; in-memory state is authoritative.
        if let Err(e) = self.store.save(Section::Chain, &chain_snapshot) {
            warn!(error = %e, "failed to persist chain after mining");
        }
        if let Err(e) = self.store.save(Section::Mempool, &self.mempool.snapshot()) {
            warn!(error = %e, "failed to persist mempool after mining");
        }

        info!(
            height = block.index,
            nonce = block.nonce,
            tx_count = block.transactions.len(),
            evicted,
            "block mined"
        );

        MineOutcome::Mined(block)
    }

    /// Re-runs the difficulty adjustment after an externally appended
    /// block (inbound gossip path).
    pub fn adjust_after_append(&self, chain: &Chain) -> u32 {
        let blocks = chain.blocks();
        let current = self.current_difficulty();
        if blocks.len() < 2 {
            return current;
        }
        let tip = &blocks[blocks.len() - 1];
        let prev = &blocks[blocks.len() - 2];
        let next = adjust_difficulty(
            current,
            tip.timestamp,
            prev.timestamp,
            self.config.target_block_interval_ms,
        );
        self.difficulty.store(next, Ordering::SeqCst);
        next
    }
}
