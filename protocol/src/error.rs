//! # Error Taxonomy
//!
//! One error type for the whole protocol surface. Each variant carries a
//! stable machine-readable kind string (see [`NodeError::kind`]) which the
//! HTTP layer serializes into `{"error": "<kind>", ...}` responses, so the
//! taxonomy doubles as the wire-level error contract.
//!
//! Propagation policy in one line: peer errors are isolated per peer,
//! admission errors return to the caller, block rejections are silent plus
//! a structured log, store errors never block logical progress.

use thiserror::Error;

use crate::chain::Amount;

/// Convenience alias used throughout the protocol crate.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Every way an Ekehi node operation can fail.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// Malformed address or bad checksum.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Structurally invalid transaction: missing fields, self-send,
    /// non-positive amount, or fee below the floor.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// The sender's replayed balance cannot cover `amount + fee`.
    #[error("insufficient balance for {address}: need {required}, have {available}")]
    InsufficientBalance {
        address: String,
        required: Amount,
        available: Amount,
    },

    /// Transaction id collides with the chain or the mempool.
    #[error("duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Link/index/hash/PoW mismatch or bad transactions in a single block.
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// Full-chain validation failed.
    #[error("chain validation failed: {0}")]
    ChainInvalid(String),

    /// RPC timeout or transport error talking to a peer.
    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    /// A sync attempt was skipped (already in flight, or cooldown).
    /// Not a failure — callers treat it as "try again later".
    #[error("sync skipped: {0}")]
    SyncSkipped(&'static str),

    /// The persistence layer errored. Logical state proceeds in memory.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed or unsupported RPC request.
    #[error("unsupported request: {0}")]
    Unsupported(String),
}

impl NodeError {
    /// Stable kind string for the HTTP error contract.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "invalid_address",
            Self::InvalidTransaction(_) => "invalid_transaction",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::DuplicateTransaction(_) => "duplicate_transaction",
            Self::InvalidBlock(_) => "invalid_block",
            Self::ChainInvalid(_) => "chain_invalid",
            Self::PeerUnreachable(_) => "peer_unreachable",
            Self::SyncSkipped(_) => "sync_skipped",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Unsupported(_) => "unsupported",
        }
    }

    /// `true` for errors caused by the caller's input (HTTP 4xx territory),
    /// `false` for internal or transport failures (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_)
                | Self::InvalidTransaction(_)
                | Self::InsufficientBalance { .. }
                | Self::DuplicateTransaction(_)
                | Self::InvalidBlock(_)
                | Self::Unsupported(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_are_stable() {
        // These strings are part of the HTTP contract. Renaming one breaks
        // every client that matches on it.
        assert_eq!(
            NodeError::InvalidAddress("x".into()).kind(),
            "invalid_address"
        );
        assert_eq!(NodeError::SyncSkipped("cooldown").kind(), "sync_skipped");
        assert_eq!(
            NodeError::StoreUnavailable("io".into()).kind(),
            "store_unavailable"
        );
    }

    #[test]
    fn client_vs_internal_split() {
        assert!(NodeError::InvalidTransaction("bad".into()).is_client_error());
        assert!(NodeError::DuplicateTransaction("id".into()).is_client_error());
        assert!(!NodeError::PeerUnreachable("http://x".into()).is_client_error());
        assert!(!NodeError::StoreUnavailable("io".into()).is_client_error());
    }

    #[test]
    fn insufficient_balance_message_includes_amounts() {
        let err = NodeError::InsufficientBalance {
            address: "EKH-test".into(),
            required: Amount::from_micro(200_001_000),
            available: Amount::from_micro(100_000_000),
        };
        let msg = err.to_string();
        assert!(msg.contains("200.001"));
        assert!(msg.contains("100"));
    }
}
