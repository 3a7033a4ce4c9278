//! # Block Structure
//!
//! A block is the unit of chain append: an ordered transaction list
//! sealed by proof-of-work and linked to its predecessor by hash.
//!
//! ## Hash computation
//!
//! ```text
//! hash = hex(SHA-256( previousBlockHash || decimal(nonce)
//!                     || json({ transactions, index }) ))
//! ```
//!
//! The JSON body serializes `transactions` before `index`, and each
//! transaction in its canonical field order (see
//! [`crate::chain::transaction`]). The block's own `timestamp`,
//! `difficulty`, and `totalFees` are *not* part of the sealed material —
//! they are validated separately.
//!
//! ## Genesis
//!
//! Genesis is fixed at construction: `index = 1`, `nonce = 100`,
//! `previousBlockHash = "0"`, sentinel `hash = "0"`, no transactions.
//! It is exempt from hash recomputation and PoW checks.

use serde::{Deserialize, Serialize};

use crate::chain::transaction::{now_ms, Transaction};
use crate::chain::Amount;
use crate::config::{GENESIS_HASH, GENESIS_NONCE};
use crate::crypto::hash::{meets_difficulty, sha256_hex};

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A full block: metadata, linkage, and the ordered transaction list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// 1-based height. Genesis is 1.
    pub index: u64,
    /// Millisecond wall clock at creation.
    pub timestamp: u64,
    /// Ordered transactions, coinbase (if any) included in sequence.
    pub transactions: Vec<Transaction>,
    /// PoW solution. Fixed at 100 for genesis.
    pub nonce: u64,
    /// Hex SHA-256 over the sealed material; `"0"` for genesis.
    pub hash: String,
    /// Hash of the predecessor; `"0"` for genesis.
    pub previous_block_hash: String,
    /// Leading-zero hex count this block's hash satisfies. Zero for
    /// genesis (exempt).
    #[serde(default)]
    pub difficulty: u32,
    /// Sum of fees across the block's non-coinbase transactions.
    #[serde(default)]
    pub total_fees: Amount,
}

impl Block {
    /// Constructs the genesis block. Created once per chain, immutable
    /// afterwards.
    pub fn genesis() -> Self {
        Self {
            index: 1,
            timestamp: now_ms(),
            transactions: Vec::new(),
            nonce: GENESIS_NONCE,
            hash: GENESIS_HASH.to_string(),
            previous_block_hash: GENESIS_HASH.to_string(),
            difficulty: 0,
            total_fees: Amount::ZERO,
        }
    }

    /// `true` for a block with the genesis sentinel shape. Index 0 is
    /// tolerated for chains produced by older peers.
    pub fn is_genesis(&self) -> bool {
        self.index <= 1
            && self.hash == GENESIS_HASH
            && self.previous_block_hash == GENESIS_HASH
    }

    /// Recomputes this block's hash from its constituents.
    pub fn compute_hash(&self) -> String {
        compute_block_hash(
            &self.previous_block_hash,
            self.nonce,
            &self.transactions,
            self.index,
        )
    }

    /// `true` if the stored hash matches the recomputed material and
    /// satisfies the block's declared difficulty. Genesis is exempt.
    pub fn verify_seal(&self) -> bool {
        if self.is_genesis() {
            return true;
        }
        self.hash == self.compute_hash() && meets_difficulty(&self.hash, self.difficulty)
    }
}

// ---------------------------------------------------------------------------
// Sealed material
// ---------------------------------------------------------------------------

/// The hashed JSON body: `transactions` first, then `index`. Field order
/// here is consensus-critical.
#[derive(Serialize)]
struct SealedMaterial<'a> {
    transactions: Vec<crate::chain::transaction::CanonicalTransaction<'a>>,
    index: u64,
}

/// Builds the exact byte string that gets hashed for a block.
pub fn block_material(
    previous_block_hash: &str,
    nonce: u64,
    transactions: &[Transaction],
    index: u64,
) -> String {
    let body = SealedMaterial {
        transactions: transactions.iter().map(|tx| tx.canonical()).collect(),
        index,
    };
    // Compact JSON. serde_json writes struct fields in declaration order,
    // which is what keeps this canonical.
    let json = serde_json::to_string(&body).expect("sealed material serializes");
    format!("{previous_block_hash}{nonce}{json}")
}

/// Computes a block hash from its constituents.
pub fn compute_block_hash(
    previous_block_hash: &str,
    nonce: u64,
    transactions: &[Transaction],
    index: u64,
) -> String {
    sha256_hex(block_material(previous_block_hash, nonce, transactions, index).as_bytes())
}

/// Checked sum of fees over the non-coinbase transactions.
/// `None` on arithmetic overflow (which no valid block can reach).
pub fn sum_fees(transactions: &[Transaction]) -> Option<Amount> {
    Amount::checked_sum(
        transactions
            .iter()
            .filter(|tx| !tx.is_coinbase())
            .map(|tx| tx.fee),
    )
}
