//! Networking: the peer table, outbound HTTP client, gossip fan-out,
//! and the full-chain sync manager.

pub mod client;
pub mod gossip;
pub mod peers;
pub mod sync;

pub use client::{PeerClient, RemoteChain, RemoteStats};
pub use gossip::Gossiper;
pub use peers::{discovery_backoff, is_loopback_url, normalize_url, PeerRecord, PeerSet};
pub use sync::{SyncManager, SyncOutcome};
