//! # Protocol Configuration & Constants
//!
//! Every magic number in Ekehi lives here. Consensus-critical values
//! (difficulty floor, genesis shape, address geometry) sit next to purely
//! operational knobs (timer intervals, HTTP timeouts) — the former must
//! never change once a network is live, the latter are fair game.
//!
//! [`NodeConfig`] is the subset that is persisted per node under the
//! `config` store key and can differ between deployments.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chain::Amount;
use crate::crypto::address::encode_address;

// ---------------------------------------------------------------------------
// Network Identity
// ---------------------------------------------------------------------------

/// Network identifier reported on `/blockchain`.
pub const NETWORK_NAME: &str = "ekehi-mainnet";

/// Human-readable token name.
pub const TOKEN_NAME: &str = "Ekehi";

/// Token ticker. Also the address prefix — one string, two jobs.
pub const TOKEN_SYMBOL: &str = "EKH";

// ---------------------------------------------------------------------------
// Address Geometry
// ---------------------------------------------------------------------------

/// Prefix on every encoded address.
pub const ADDRESS_PREFIX: &str = "EKH";

/// Raw payload length in bytes (derived from key material).
pub const ADDRESS_PAYLOAD_LEN: usize = 20;

/// Checksum length in bytes: the leading bytes of SHA-256(payload).
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

/// Total length of an encoded address: `"EKH"` + 48 hex chars.
pub const ADDRESS_ENCODED_LEN: usize =
    ADDRESS_PREFIX.len() + 2 * (ADDRESS_PAYLOAD_LEN + ADDRESS_CHECKSUM_LEN);

// ---------------------------------------------------------------------------
// Reserved Senders
// ---------------------------------------------------------------------------

/// Coinbase sender token. Every mining reward transaction carries it.
pub const COINBASE_SENDER: &str = "00";

/// System senders minted by the issuing node itself. They bypass address
/// format and balance checks; once on chain, peers replay them as
/// first-class emissions.
pub const SYSTEM_SENDERS: &[&str] = &["FAUCET", "ECOSYSTEM"];

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// Fixed genesis nonce. Not a PoW solution — genesis is exempt.
pub const GENESIS_NONCE: u64 = 100;

/// Sentinel hash for the genesis block and its (nonexistent) parent.
pub const GENESIS_HASH: &str = "0";

// ---------------------------------------------------------------------------
// Consensus Parameters
// ---------------------------------------------------------------------------

/// Starting difficulty: required count of leading `'0'` hex characters.
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Difficulty never adjusts below this. A zero-difficulty network would
/// accept any hash, which is another way of saying "no network at all".
pub const DIFFICULTY_FLOOR: u32 = 1;

/// Target interval between blocks. The difficulty adjuster steers the
/// observed interval toward this value, one step per block.
pub const DEFAULT_TARGET_BLOCK_INTERVAL_MS: u64 = 60_000;

/// Reward emitted by the coinbase transaction of every mined block:
/// 12.5 EKH.
pub const DEFAULT_MINING_REWARD_MICRO: u64 = 12_500_000;

/// Fee floor for transactions from non-reserved senders: 0.001 EKH.
pub const DEFAULT_MIN_FEE_MICRO: u64 = 1_000;

/// Maximum transactions per block, coinbase included.
pub const DEFAULT_MAX_TRANSACTIONS_PER_BLOCK: usize = 100;

// ---------------------------------------------------------------------------
// Mining
// ---------------------------------------------------------------------------

/// How often the auto-mining scheduler polls the mempool.
pub const MINER_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// The PoW loop checks for cancellation (a tip change) every this many
/// hash attempts. Small enough to abort promptly, large enough that the
/// atomic load disappears into the hashing cost.
pub const POW_CANCEL_CHECK_INTERVAL: u64 = 4_096;

/// Number of trailing blocks used for the hashrate estimate.
pub const HASHRATE_WINDOW: usize = 16;

// ---------------------------------------------------------------------------
// Networking
// ---------------------------------------------------------------------------

/// Upper bound on the peer table.
pub const DEFAULT_MAX_PEERS: usize = 25;

/// Per-request timeout for ordinary peer RPCs (chain download, block
/// broadcast, registration).
pub const PEER_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Shorter timeout for health probes — a peer that cannot answer
/// `/stats` in this window is not a peer worth waiting on.
pub const PEER_HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded concurrency for gossip fan-out.
pub const GOSSIP_CONCURRENCY: usize = 8;

/// Bounded concurrency for full-chain downloads during sync.
pub const SYNC_FETCH_CONCURRENCY: usize = 8;

/// Minimum interval between two sync attempts.
pub const SYNC_COOLDOWN: Duration = Duration::from_secs(5);

/// Periodic full-sync ticker interval.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Health-monitor ticker interval.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// A peer is evicted after this many consecutive failed health checks.
pub const UNHEALTHY_EVICTION_THRESHOLD: u32 = 3;

/// Delay before the first discovery run after startup, giving the HTTP
/// listener time to come up so seeds can call back.
pub const DISCOVERY_STARTUP_DELAY: Duration = Duration::from_secs(3);

/// Base interval between discovery runs. Grows by 1.5x per consecutive
/// failure, capped at [`DISCOVERY_MAX_INTERVAL`].
pub const DISCOVERY_BASE_INTERVAL: Duration = Duration::from_secs(30);

/// Hard cap on the discovery backoff.
pub const DISCOVERY_MAX_INTERVAL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Attempts to open the store at startup before giving up.
pub const STORE_OPEN_RETRIES: u32 = 3;

/// Base delay between store-open retries; doubles per attempt.
pub const STORE_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

/// Per-node configuration, persisted under the `config` store key.
///
/// Everything here can vary between deployments without forking the
/// network — although nodes with different rewards or fee floors will
/// reject each other's blocks, which is a fork in all but name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    /// Required leading-zero hex count for new blocks.
    pub difficulty: u32,
    /// Address credited by this node's coinbase transactions.
    pub miner_address: String,
    /// Target interval between blocks in milliseconds.
    pub target_block_interval_ms: u64,
    /// Coinbase reward per block.
    pub mining_reward: Amount,
    /// Fee floor for non-reserved senders.
    pub min_fee: Amount,
    /// Maximum transactions per block, coinbase included.
    pub max_transactions_per_block: usize,
    /// Upper bound on the peer table.
    pub max_peers: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            miner_address: encode_address(&[0u8; ADDRESS_PAYLOAD_LEN]),
            target_block_interval_ms: DEFAULT_TARGET_BLOCK_INTERVAL_MS,
            mining_reward: Amount::from_micro(DEFAULT_MINING_REWARD_MICRO),
            min_fee: Amount::from_micro(DEFAULT_MIN_FEE_MICRO),
            max_transactions_per_block: DEFAULT_MAX_TRANSACTIONS_PER_BLOCK,
            max_peers: DEFAULT_MAX_PEERS,
        }
    }
}
