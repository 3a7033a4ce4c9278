//! # Sync Manager
//!
//! Pulls full chains from every peer, picks the best candidate, and
//! adopts it atomically. This is the only component allowed to replace
//! the chain wholesale — single-block appends go through the inbound
//! gossip path, and anything that path rejects eventually reconciles
//! here.
//!
//! ## Serialization
//!
//! At most one sync runs at a time (`in_progress` flag) and successive
//! attempts are separated by a cooldown. Callers hitting either
//! condition get a typed `Skipped` outcome, not an error — sync being
//! busy is normal operation.
//!
//! ## Fork choice
//!
//! Candidates are ranked by length, then declared difficulty, then the
//! total-work proxy (Σ 2^difficulty), with a stable sort so
//! first-observed wins remaining ties. A candidate is adopted only if it
//! is strictly longer than the local chain *and* survives full
//! validation (replay from genesis). Adoption snapshots the previous
//! chain and mempool; a persistence failure rolls both back and reports
//! `update_failed` — readers never observe a half-applied replacement.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::chain::{work_of, Block, Chain, Transaction};
use crate::config::{NodeConfig, DIFFICULTY_FLOOR, SYNC_COOLDOWN, SYNC_FETCH_CONCURRENCY};
use crate::mempool::Mempool;
use crate::network::client::PeerClient;
use crate::network::peers::{is_loopback_url, PeerSet};
use crate::store::{Section, Store};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The attempt did not run: another sync is in flight, or the
    /// cooldown has not elapsed.
    Skipped { reason: &'static str },
    /// A longer valid chain was adopted.
    Updated {
        old_len: u64,
        new_len: u64,
        source: String,
    },
    /// The attempt ran but the local chain stands.
    Unchanged { reason: &'static str },
}

impl SyncOutcome {
    /// `true` if a chain replacement happened.
    pub fn updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// One structurally sound chain fetched from a peer.
struct Candidate {
    source: String,
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    declared_difficulty: u32,
    work: u128,
}

/// Cheap structural screen applied before the expensive full validation:
/// non-empty, genesis-shaped head, contiguous indices, intact hash links.
fn structurally_sound(blocks: &[Block]) -> bool {
    let Some(first) = blocks.first() else {
        return false;
    };
    if !first.is_genesis() {
        return false;
    }
    blocks.windows(2).all(|pair| {
        pair[1].index == pair[0].index + 1 && pair[1].previous_block_hash == pair[0].hash
    })
}

// ---------------------------------------------------------------------------
// SyncManager
// ---------------------------------------------------------------------------

/// Serialized, cooldown-bounded full-chain synchronization.
pub struct SyncManager {
    chain: Arc<RwLock<Chain>>,
    mempool: Arc<Mempool>,
    peers: Arc<PeerSet>,
    store: Arc<Store>,
    client: PeerClient,
    config: NodeConfig,
    /// Bumped on every tip change; the miner watches it for cancellation.
    revision: Arc<AtomicU64>,
    /// The node's current mining difficulty, updated on adoption.
    difficulty: Arc<AtomicU32>,
    in_progress: AtomicBool,
    last_attempt: Mutex<Option<Instant>>,
}

/// Clears the in-progress flag when a sync attempt ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<RwLock<Chain>>,
        mempool: Arc<Mempool>,
        peers: Arc<PeerSet>,
        store: Arc<Store>,
        client: PeerClient,
        config: NodeConfig,
        revision: Arc<AtomicU64>,
        difficulty: Arc<AtomicU32>,
    ) -> Self {
        Self {
            chain,
            mempool,
            peers,
            store,
            client,
            config,
            revision,
            difficulty,
            in_progress: AtomicBool::new(false),
            last_attempt: Mutex::new(None),
        }
    }

    /// `true` while a sync attempt is running. The mining scheduler
    /// checks this to avoid sealing blocks on a tip about to vanish.
    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Runs one full sync attempt: fetch every peer's chain, rank, and
    /// adopt the best strictly-longer valid candidate.
    pub async fn sync_once(&self) -> SyncOutcome {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SyncOutcome::Skipped {
                reason: "in_progress",
            };
        }
        let _guard = InFlightGuard(&self.in_progress);

        {
            let mut last = self.last_attempt.lock();
            if let Some(at) = *last {
                if at.elapsed() < SYNC_COOLDOWN {
                    return SyncOutcome::Skipped { reason: "cooldown" };
                }
            }
            *last = Some(Instant::now());
        }

        let targets: Vec<String> = self
            .peers
            .urls()
            .into_iter()
            .filter(|url| !is_loopback_url(url))
            .collect();

        if targets.is_empty() {
            return SyncOutcome::Unchanged {
                reason: "no_peers",
            };
        }

        debug!(peers = targets.len(), "sync: fetching chains");

        let fetched: Vec<Candidate> = stream::iter(targets)
            .map(|peer| {
                let client = self.client.clone();
                async move {
                    match client.get_blockchain(&peer).await {
                        Ok(remote) => Some((peer, remote)),
                        Err(e) => {
                            debug!(peer = %peer, error = %e, "sync fetch failed");
                            None
                        }
                    }
                }
            })
            .buffer_unordered(SYNC_FETCH_CONCURRENCY)
            .filter_map(futures::future::ready)
            .filter_map(|(peer, remote)| {
                let keep = structurally_sound(&remote.chain);
                if !keep {
                    warn!(peer = %peer, "sync: discarding structurally invalid chain");
                }
                futures::future::ready(keep.then(|| Candidate {
                    work: work_of(&remote.chain),
                    source: peer,
                    blocks: remote.chain,
                    pending: remote.pending_transactions,
                    declared_difficulty: remote.difficulty,
                }))
            })
            .collect()
            .await;

        if fetched.is_empty() {
            return SyncOutcome::Unchanged {
                reason: "no_candidates",
            };
        }

        // Rank: length desc, declared difficulty desc, work desc. The
        // sort is stable, so first-observed wins remaining ties.
        let mut candidates = fetched;
        candidates.sort_by(|a, b| {
            b.blocks
                .len()
                .cmp(&a.blocks.len())
                .then(b.declared_difficulty.cmp(&a.declared_difficulty))
                .then(b.work.cmp(&a.work))
        });
        let best = candidates.remove(0);

        self.adopt(
            &best.source,
            best.blocks,
            best.pending,
            best.declared_difficulty,
        )
    }

    /// Validates a candidate chain and, if strictly longer than the local
    /// chain, replaces chain and mempool atomically.
    ///
    /// Rollback contract: on persistence failure the previous in-memory
    /// state is restored and the outcome is `update_failed`. Adoption of
    /// the same chain twice is a no-op (`not_longer`).
    pub fn adopt(
        &self,
        source: &str,
        blocks: Vec<Block>,
        remote_pending: Vec<Transaction>,
        declared_difficulty: u32,
    ) -> SyncOutcome {
        {
            let local_len = self.chain.read().len();
            if blocks.len() as u64 <= local_len {
                return SyncOutcome::Unchanged {
                    reason: "not_longer",
                };
            }
        }

        if let Err(e) = Chain::validate_full(&blocks, &self.config) {
            warn!(source = %source, error = %e, "sync: candidate failed full validation");
            return SyncOutcome::Unchanged {
                reason: "invalid_remote_chain",
            };
        }

        let candidate = match Chain::from_blocks(blocks) {
            Ok(chain) => chain,
            Err(_) => {
                return SyncOutcome::Unchanged {
                    reason: "invalid_remote_chain",
                }
            }
        };

        // Atomic swap under the write lock. Readers see either the old
        // chain or the fully adopted one, never an intermediate.
        let mut chain = self.chain.write();

        // Re-check under the lock: another writer may have extended the
        // local chain while we were validating.
        let old_len = chain.len();
        if candidate.len() <= old_len {
            return SyncOutcome::Unchanged {
                reason: "not_longer",
            };
        }

        let previous_chain = chain.clone();
        let previous_pending = self.mempool.snapshot();

        let adopted_ids = candidate.transaction_ids();
        let new_len = candidate.len();
        *chain = candidate;
        self.mempool.reconcile_after_replace(&adopted_ids, remote_pending);

        let persisted = self
            .store
            .save(Section::Chain, &*chain)
            .and_then(|()| self.store.save(Section::Mempool, &self.mempool.snapshot()));

        if let Err(e) = persisted {
            warn!(error = %e, "sync: persistence failed, rolling back adoption");
            *chain = previous_chain;
            self.mempool.restore(previous_pending);
            // Best effort: leave the store matching the restored state.
            if let Err(e) = self.store.save(Section::Chain, &*chain) {
                warn!(error = %e, "sync: rollback persistence also failed");
            }
            return SyncOutcome::Unchanged {
                reason: "update_failed",
            };
        }

        let tip_difficulty = chain.tip().difficulty;
        drop(chain);

        self.difficulty.store(
            declared_difficulty.max(tip_difficulty).max(DIFFICULTY_FLOOR),
            Ordering::SeqCst,
        );
        self.revision.fetch_add(1, Ordering::SeqCst);

        info!(
            source = %source,
            old_len,
            new_len,
            "adopted longer chain from peer"
        );

        SyncOutcome::Updated {
            old_len,
            new_len,
            source: source.to_string(),
        }
    }
}
