//! # Peer Set
//!
//! The node's view of the network: known peer URLs, their last observed
//! health, height, and difficulty. Admission rules keep the table sane —
//! no self-references, no loopback URLs leaking out of local dev setups,
//! no duplicates, and a hard cap on size.
//!
//! Health flows in from two places: the periodic health monitor and the
//! discovery procedure. A peer that fails
//! [`crate::config::UNHEALTHY_EVICTION_THRESHOLD`] consecutive probes is
//! evicted outright; until then it is only flagged unhealthy, which
//! removes it from gossip and sync targets without forgetting it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::chain::transaction::now_ms;
use crate::config::UNHEALTHY_EVICTION_THRESHOLD;

// ---------------------------------------------------------------------------
// PeerRecord
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// One known peer and what we last observed about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    /// Base URL, normalized without a trailing slash.
    pub url: String,
    /// Millisecond timestamp of the last successful contact.
    pub last_seen: u64,
    /// Chain height the peer last reported.
    #[serde(default)]
    pub last_height: u64,
    /// Difficulty the peer last reported.
    #[serde(default)]
    pub last_difficulty: u32,
    /// Whether the most recent probe succeeded.
    #[serde(default = "default_true")]
    pub healthy: bool,
    /// Consecutive failed probes. Resets on any success.
    #[serde(default)]
    pub consecutive_failures: u32,
}

impl PeerRecord {
    fn new(url: String) -> Self {
        Self {
            url,
            last_seen: now_ms(),
            last_height: 0,
            last_difficulty: 0,
            healthy: true,
            consecutive_failures: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

/// Strips a trailing slash so `http://a/` and `http://a` are one peer.
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// `true` for URLs that point back at the local machine. Loopback peers
/// are useless to everyone else on the network and are pruned on sight.
pub fn is_loopback_url(url: &str) -> bool {
    let without_scheme = url
        .trim()
        .strip_prefix("http://")
        .or_else(|| url.trim().strip_prefix("https://"))
        .unwrap_or(url);
    let host = without_scheme
        .split(['/', ':'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1"
}

/// Discovery backoff: `base * 1.5^failures`, capped.
pub fn discovery_backoff(base: Duration, failures: u32, cap: Duration) -> Duration {
    let factor = 1.5f64.powi(failures.min(16) as i32);
    let scaled = base.as_secs_f64() * factor;
    Duration::from_secs_f64(scaled.min(cap.as_secs_f64()))
}

// ---------------------------------------------------------------------------
// PeerSet
// ---------------------------------------------------------------------------

/// Thread-safe peer table with seed bootstrap list.
pub struct PeerSet {
    peers: RwLock<Vec<PeerRecord>>,
    seeds: Vec<String>,
    own_url: RwLock<String>,
    max_peers: usize,
    /// Consecutive failed discovery rounds, drives the backoff schedule.
    discovery_failures: AtomicU32,
}

impl PeerSet {
    /// Creates a peer set with the given seed URLs and our own public URL.
    pub fn new(seeds: Vec<String>, own_url: String, max_peers: usize) -> Self {
        Self {
            peers: RwLock::new(Vec::new()),
            seeds: seeds.iter().map(|s| normalize_url(s)).collect(),
            own_url: RwLock::new(normalize_url(&own_url)),
            max_peers,
            discovery_failures: AtomicU32::new(0),
        }
    }

    /// The configured seed URLs.
    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    /// This node's public URL.
    pub fn own_url(&self) -> String {
        self.own_url.read().clone()
    }

    /// Updates the public URL (e.g. once the hosting platform tells us).
    pub fn set_own_url(&self, url: &str) {
        *self.own_url.write() = normalize_url(url);
    }

    /// Adds a peer URL, returning `true` if it was actually inserted.
    ///
    /// Rejected: our own URL, loopback URLs, duplicates, and anything
    /// beyond the configured maximum.
    pub fn add(&self, url: &str) -> bool {
        let url = normalize_url(url);
        if url.is_empty() || url == self.own_url() || is_loopback_url(&url) {
            return false;
        }

        let mut peers = self.peers.write();
        if peers.len() >= self.max_peers {
            debug!(url = %url, "peer table full, rejecting");
            return false;
        }
        if peers.iter().any(|p| p.url == url) {
            return false;
        }

        info!(url = %url, "peer added");
        peers.push(PeerRecord::new(url));
        true
    }

    /// Removes a peer by URL.
    pub fn remove(&self, url: &str) {
        let url = normalize_url(url);
        self.peers.write().retain(|p| p.url != url);
    }

    /// All known peer URLs.
    pub fn urls(&self) -> Vec<String> {
        self.peers.read().iter().map(|p| p.url.clone()).collect()
    }

    /// URLs of peers currently marked healthy.
    pub fn healthy_urls(&self) -> Vec<String> {
        self.peers
            .read()
            .iter()
            .filter(|p| p.healthy)
            .map(|p| p.url.clone())
            .collect()
    }

    /// Snapshot of all records.
    pub fn records(&self) -> Vec<PeerRecord> {
        self.peers.read().clone()
    }

    /// Replaces the table from persisted records, re-applying the
    /// admission rules (the on-disk file may predate a URL change or
    /// contain loopback entries from a dev run).
    pub fn restore(&self, records: Vec<PeerRecord>) {
        let own = self.own_url();
        let mut peers = self.peers.write();
        peers.clear();
        for mut record in records {
            record.url = normalize_url(&record.url);
            if record.url.is_empty() || record.url == own || is_loopback_url(&record.url) {
                continue;
            }
            if peers.len() >= self.max_peers || peers.iter().any(|p| p.url == record.url) {
                continue;
            }
            peers.push(record);
        }
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// `true` if no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    // -- Health -------------------------------------------------------------

    /// Records a successful probe: marks healthy, stamps `last_seen`,
    /// updates observed height/difficulty, resets the failure streak.
    pub fn mark_healthy(&self, url: &str, height: u64, difficulty: u32) {
        let url = normalize_url(url);
        let mut peers = self.peers.write();
        if let Some(peer) = peers.iter_mut().find(|p| p.url == url) {
            peer.healthy = true;
            peer.last_seen = now_ms();
            peer.last_height = height;
            peer.last_difficulty = difficulty;
            peer.consecutive_failures = 0;
        }
    }

    /// Records a failed probe. After
    /// [`UNHEALTHY_EVICTION_THRESHOLD`] consecutive failures the peer is
    /// evicted; returns `true` when that happens.
    pub fn mark_unhealthy(&self, url: &str) -> bool {
        let url = normalize_url(url);
        let mut peers = self.peers.write();
        let Some(peer) = peers.iter_mut().find(|p| p.url == url) else {
            return false;
        };

        peer.healthy = false;
        peer.consecutive_failures += 1;

        if peer.consecutive_failures >= UNHEALTHY_EVICTION_THRESHOLD {
            info!(url = %url, failures = peer.consecutive_failures, "evicting unhealthy peer");
            peers.retain(|p| p.url != url);
            return true;
        }
        false
    }

    /// Drops every peer currently flagged unhealthy (discovery phase 3).
    /// Returns the removed URLs.
    pub fn prune_unhealthy(&self) -> Vec<String> {
        let mut peers = self.peers.write();
        let removed: Vec<String> = peers
            .iter()
            .filter(|p| !p.healthy)
            .map(|p| p.url.clone())
            .collect();
        peers.retain(|p| p.healthy);
        for url in &removed {
            debug!(url = %url, "pruned unhealthy peer");
        }
        removed
    }

    // -- Discovery bookkeeping ----------------------------------------------

    /// Current consecutive failed discovery rounds.
    pub fn discovery_failures(&self) -> u32 {
        self.discovery_failures.load(Ordering::Relaxed)
    }

    /// Records the outcome of a discovery round and returns the updated
    /// failure streak.
    pub fn record_discovery_result(&self, success: bool) -> u32 {
        if success {
            self.discovery_failures.store(0, Ordering::Relaxed);
            0
        } else {
            self.discovery_failures.fetch_add(1, Ordering::Relaxed) + 1
        }
    }
}
