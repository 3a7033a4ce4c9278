//! # Transaction Model
//!
//! The transaction record, its canonical (consensus) serialization, and
//! the structural validation rules shared by mempool admission and
//! full-chain validation.
//!
//! ## Canonical serialization
//!
//! Block hashing serializes each transaction in the exact field order
//! `amount, sender, recipient, fee, transactionId, timestamp, [network]`.
//! This ordering is consensus-critical: a node that serializes fields in
//! any other order computes different block hashes and drops off the
//! network. The [`Transaction`] struct declares its fields in that order
//! and the canonical view strips everything else.
//!
//! ## Annotations
//!
//! Transactions may carry extra keys (`activity`, UI tags, …). They are
//! round-tripped on the wire and on disk but excluded from hashing — two
//! transactions that differ only in annotations are the same transaction
//! as far as consensus is concerned. The one exception is `network`,
//! which is part of the canonical order when present.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::chain::Amount;
use crate::config::COINBASE_SENDER;
use crate::crypto::address::{is_reserved_sender, validate_address};
use crate::error::NodeError;

/// Milliseconds since the UNIX epoch, wall clock.
pub(crate) fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A single value transfer.
///
/// Field declaration order matters — see the module docs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Quantity transferred to the recipient.
    pub amount: Amount,
    /// Source address, or a reserved token (`"00"`, `"FAUCET"`, …).
    pub sender: String,
    /// Destination address.
    pub recipient: String,
    /// Fee paid to the miner. Zero for reserved senders.
    pub fee: Amount,
    /// 128-bit opaque identifier, unique across the chain.
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    /// Millisecond wall clock at creation.
    pub timestamp: u64,
    /// Optional network tag. Included in hashing when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Opaque annotations (e.g. `activity`). Never hashed.
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub annotations: serde_json::Map<String, Value>,
}

impl Transaction {
    /// Creates a transaction with a fresh 128-bit id and the current
    /// wall-clock timestamp.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: Amount,
        fee: Amount,
    ) -> Self {
        Self {
            amount,
            sender: sender.into(),
            recipient: recipient.into(),
            fee,
            transaction_id: Uuid::new_v4().simple().to_string(),
            timestamp: now_ms(),
            network: None,
            annotations: serde_json::Map::new(),
        }
    }

    /// Creates the mining-reward transaction for a freshly mined block.
    pub fn coinbase(miner_address: impl Into<String>, reward: Amount) -> Self {
        Self::new(COINBASE_SENDER, miner_address, reward, Amount::ZERO)
    }

    /// `true` if this is a coinbase (mining reward) transaction.
    pub fn is_coinbase(&self) -> bool {
        self.sender == COINBASE_SENDER
    }

    /// `true` if the sender is any reserved token.
    pub fn has_reserved_sender(&self) -> bool {
        is_reserved_sender(&self.sender)
    }

    /// The canonical view used for block hashing.
    pub(crate) fn canonical(&self) -> CanonicalTransaction<'_> {
        CanonicalTransaction {
            amount: self.amount,
            sender: &self.sender,
            recipient: &self.recipient,
            fee: self.fee,
            transaction_id: &self.transaction_id,
            timestamp: self.timestamp,
            network: self.network.as_deref(),
        }
    }
}

/// Hash-relevant projection of a transaction, in canonical field order.
/// Annotations are deliberately absent.
#[derive(Serialize)]
pub(crate) struct CanonicalTransaction<'a> {
    amount: Amount,
    sender: &'a str,
    recipient: &'a str,
    fee: Amount,
    #[serde(rename = "transactionId")]
    transaction_id: &'a str,
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Structural validation
// ---------------------------------------------------------------------------

/// Structural checks applied to every transaction, cheapest first.
///
/// 1. **Id** — non-empty, at most 64 chars, `[0-9a-zA-Z-]` only.
/// 2. **Amount** — strictly positive.
/// 3. **Self-send** — sender must differ from recipient.
/// 4. **Sender shape** — reserved token or checksummed address.
/// 5. **Recipient shape** — checksummed address (or reserved token).
/// 6. **Fee floor** — `fee >= min_fee` unless the sender is reserved.
///
/// Balance and duplicate-id checks are stateful and live with the chain
/// replay, not here.
pub fn validate_shape(tx: &Transaction, min_fee: Amount) -> Result<(), NodeError> {
    if tx.transaction_id.is_empty()
        || tx.transaction_id.len() > 64
        || !tx
            .transaction_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(NodeError::InvalidTransaction(format!(
            "malformed transaction id {:?}",
            tx.transaction_id
        )));
    }

    if tx.amount.is_zero() {
        return Err(NodeError::InvalidTransaction(
            "amount must be positive".into(),
        ));
    }

    if tx.sender == tx.recipient {
        return Err(NodeError::InvalidTransaction(format!(
            "sender and recipient must differ: both are {}",
            tx.sender
        )));
    }

    if !is_reserved_sender(&tx.sender) && !validate_address(&tx.sender) {
        return Err(NodeError::InvalidAddress(format!(
            "sender {:?} is not a valid address",
            tx.sender
        )));
    }

    if !validate_address(&tx.recipient) && !is_reserved_sender(&tx.recipient) {
        return Err(NodeError::InvalidAddress(format!(
            "recipient {:?} is not a valid address",
            tx.recipient
        )));
    }

    if !is_reserved_sender(&tx.sender) && tx.fee < min_fee {
        return Err(NodeError::InvalidTransaction(format!(
            "fee {} below minimum {}",
            tx.fee, min_fee
        )));
    }

    Ok(())
}
