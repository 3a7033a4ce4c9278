//! # Chain State & Validation
//!
//! The ordered, append-mostly block sequence and every rule that decides
//! whether a block — or a whole replacement chain — is acceptable.
//!
//! ## Validation model
//!
//! Balances are not stored; they are *replayed* from genesis. Full-chain
//! validation walks the candidate front to back, maintaining a running
//! balance map and a set of seen transaction ids, and rejects on the
//! first violation: broken linkage, bad seal, insufficient PoW,
//! duplicate id, overdraft, coinbase irregularity, or a `totalFees`
//! mismatch. Single-block acceptance (`validate_incoming`) applies the
//! same transaction rules against the balances replayed from the local
//! chain.
//!
//! ## Fork choice inputs
//!
//! The sync manager ranks candidate chains by length, then by total
//! work. Work is a proxy — Σ 2^difficulty over all blocks — not a
//! cryptographic accumulation; it only breaks ties between equal-length
//! chains.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::chain::block::{sum_fees, Block};
use crate::chain::transaction::{validate_shape, Transaction};
use crate::chain::Amount;
use crate::config::{DIFFICULTY_FLOOR, NodeConfig};
use crate::error::NodeError;

// ---------------------------------------------------------------------------
// AddressData
// ---------------------------------------------------------------------------

/// Everything the explorer-facing `/address/:addr` endpoint reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressData {
    /// The queried address.
    pub address: String,
    /// Current balance after replaying the canonical chain.
    pub balance: Amount,
    /// Total amount sent (excluding fees).
    pub total_sent: Amount,
    /// Total amount received.
    pub total_received: Amount,
    /// Total fees paid.
    pub total_fees_paid: Amount,
    /// Number of on-chain transactions touching this address.
    pub transaction_count: usize,
    /// The transactions themselves, in chain order.
    pub transactions: Vec<Transaction>,
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// The canonical chain held by a node. Always contains at least genesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// Fresh chain containing only a newly constructed genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// Wraps an existing block sequence (e.g. loaded from the store or
    /// adopted from a peer). The sequence must be non-empty and start
    /// with a genesis-shaped block; full validation is the caller's
    /// responsibility.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, NodeError> {
        match blocks.first() {
            Some(first) if first.is_genesis() => Ok(Self { blocks }),
            Some(_) => Err(NodeError::ChainInvalid(
                "chain does not start with genesis".into(),
            )),
            None => Err(NodeError::ChainInvalid("chain is empty".into())),
        }
    }

    /// All blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Consumes the chain, returning its blocks.
    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// The current tip (last block).
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("chain always contains genesis")
    }

    /// Block count, genesis included.
    pub fn len(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// A chain is never empty, but clippy insists the pair exists.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Height the next mined block will carry. Advisory for callers —
    /// mining may include a submitted transaction later than this.
    pub fn next_index(&self) -> u64 {
        self.tip().index + 1
    }

    /// Appends a block to the tip.
    ///
    /// Precondition: the block passed [`Chain::validate_incoming`].
    /// This method does not re-validate.
    pub fn append(&mut self, block: Block) {
        self.blocks.push(block);
    }

    // -- Single-block acceptance --------------------------------------------

    /// Full acceptance check for a block claiming to extend the tip:
    /// linkage, index continuity, declared difficulty, seal (hash
    /// recomputation + PoW), and every transaction rule replayed against
    /// current balances.
    ///
    /// Anything deeper than a direct tip extension is rejected here —
    /// reconciling longer forks is the sync manager's job.
    pub fn validate_incoming(&self, block: &Block, config: &NodeConfig) -> Result<(), NodeError> {
        let tip = self.tip();

        if block.previous_block_hash != tip.hash {
            return Err(NodeError::InvalidBlock(format!(
                "previous hash {} does not match tip {}",
                block.previous_block_hash, tip.hash
            )));
        }
        if block.index != tip.index + 1 {
            return Err(NodeError::InvalidBlock(format!(
                "index {} does not follow tip index {}",
                block.index, tip.index
            )));
        }
        if block.difficulty < DIFFICULTY_FLOOR {
            return Err(NodeError::InvalidBlock(format!(
                "declared difficulty {} below floor {DIFFICULTY_FLOOR}",
                block.difficulty
            )));
        }
        if !block.verify_seal() {
            return Err(NodeError::InvalidBlock(
                "hash does not match sealed material or misses difficulty".into(),
            ));
        }

        let mut balances = replay_balances(&self.blocks);
        let mut seen = self.transaction_ids();
        validate_block_transactions(block, &mut balances, &mut seen, config)
    }

    // -- Full-chain validation ----------------------------------------------

    /// Validates an entire candidate chain end-to-end: genesis shape,
    /// linkage and index continuity at every height, seals, and a full
    /// transaction replay from genesis.
    ///
    /// A genesis with index 0 is tolerated (older peers); all subsequent
    /// blocks must still increment the index by exactly one.
    pub fn validate_full(blocks: &[Block], config: &NodeConfig) -> Result<(), NodeError> {
        let first = blocks
            .first()
            .ok_or_else(|| NodeError::ChainInvalid("chain is empty".into()))?;
        if !first.is_genesis() {
            return Err(NodeError::ChainInvalid(
                "first block is not a valid genesis".into(),
            ));
        }
        if !first.transactions.is_empty() {
            return Err(NodeError::ChainInvalid(
                "genesis must not contain transactions".into(),
            ));
        }

        let mut balances: HashMap<String, Amount> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (prev, block) in blocks.iter().zip(blocks.iter().skip(1)) {
            let context = |err: NodeError| {
                NodeError::ChainInvalid(format!("block {}: {err}", block.index))
            };

            if block.index != prev.index + 1 {
                return Err(NodeError::ChainInvalid(format!(
                    "index {} does not follow {}",
                    block.index, prev.index
                )));
            }
            if block.previous_block_hash != prev.hash {
                return Err(NodeError::ChainInvalid(format!(
                    "block {} does not link to its predecessor",
                    block.index
                )));
            }
            if block.difficulty < DIFFICULTY_FLOOR {
                return Err(context(NodeError::InvalidBlock(format!(
                    "declared difficulty {} below floor",
                    block.difficulty
                ))));
            }
            if !block.verify_seal() {
                return Err(context(NodeError::InvalidBlock("bad seal".into())));
            }

            validate_block_transactions(block, &mut balances, &mut seen, config)
                .map_err(context)?;
        }

        Ok(())
    }

    // -- Queries ------------------------------------------------------------

    /// Balance of an address after replaying the canonical chain.
    pub fn balance_of(&self, address: &str) -> Amount {
        replay_balances(&self.blocks)
            .get(address)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Full explorer record for an address. Linear scan — working sets
    /// on this network are small.
    pub fn address_data(&self, address: &str) -> AddressData {
        let mut data = AddressData {
            address: address.to_string(),
            balance: self.balance_of(address),
            total_sent: Amount::ZERO,
            total_received: Amount::ZERO,
            total_fees_paid: Amount::ZERO,
            transaction_count: 0,
            transactions: Vec::new(),
        };

        for block in &self.blocks {
            for tx in &block.transactions {
                let sent = tx.sender == address;
                let received = tx.recipient == address;
                if !sent && !received {
                    continue;
                }
                if sent {
                    data.total_sent = data
                        .total_sent
                        .checked_add(tx.amount)
                        .unwrap_or(data.total_sent);
                    data.total_fees_paid = data
                        .total_fees_paid
                        .checked_add(tx.fee)
                        .unwrap_or(data.total_fees_paid);
                }
                if received {
                    data.total_received = data
                        .total_received
                        .checked_add(tx.amount)
                        .unwrap_or(data.total_received);
                }
                data.transaction_count += 1;
                data.transactions.push(tx.clone());
            }
        }

        data
    }

    /// Finds a block by its hex hash.
    pub fn block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    /// Finds a transaction and its containing block by id.
    pub fn transaction_by_id(&self, id: &str) -> Option<(&Transaction, &Block)> {
        self.blocks.iter().find_map(|block| {
            block
                .transactions
                .iter()
                .find(|tx| tx.transaction_id == id)
                .map(|tx| (tx, block))
        })
    }

    /// `true` if any on-chain transaction carries this id.
    pub fn contains_transaction(&self, id: &str) -> bool {
        self.transaction_by_id(id).is_some()
    }

    /// All on-chain transaction ids.
    pub fn transaction_ids(&self) -> HashSet<String> {
        self.blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .map(|tx| tx.transaction_id.clone())
            .collect()
    }

    /// Total number of on-chain transactions.
    pub fn transaction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.transactions.len()).sum()
    }

    /// Total-work proxy for this chain: Σ 2^difficulty.
    pub fn total_work(&self) -> u128 {
        work_of(&self.blocks)
    }

    /// Circulating supply: everything minted by reserved senders, minus
    /// fees burned by ordinary senders (fees debit the sender and credit
    /// nobody).
    pub fn total_supply(&self) -> Amount {
        let mut supply = Amount::ZERO;
        for tx in self.blocks.iter().flat_map(|b| b.transactions.iter()) {
            if tx.has_reserved_sender() {
                supply = supply.checked_add(tx.amount).unwrap_or(supply);
            } else {
                supply = supply.saturating_sub(tx.fee);
            }
        }
        supply
    }
}

// ---------------------------------------------------------------------------
// Replay helpers
// ---------------------------------------------------------------------------

/// Total-work proxy over a raw block slice: Σ 2^difficulty.
pub fn work_of(blocks: &[Block]) -> u128 {
    blocks
        .iter()
        .map(|b| 1u128 << b.difficulty.min(127))
        .fold(0u128, u128::saturating_add)
}

/// Replays balances over an already-validated chain. Saturating math —
/// a canonical chain cannot underflow, and a corrupted one should not
/// panic a read path.
fn replay_balances(blocks: &[Block]) -> HashMap<String, Amount> {
    let mut balances: HashMap<String, Amount> = HashMap::new();
    for tx in blocks.iter().flat_map(|b| b.transactions.iter()) {
        let credited = balances.entry(tx.recipient.clone()).or_insert(Amount::ZERO);
        *credited = credited.checked_add(tx.amount).unwrap_or(*credited);

        if !tx.has_reserved_sender() {
            let debit = tx.amount.checked_add(tx.fee).unwrap_or(tx.amount);
            let from = balances.entry(tx.sender.clone()).or_insert(Amount::ZERO);
            *from = from.saturating_sub(debit);
        }
    }
    balances
}

/// Validates one block's transactions against running chain state,
/// mutating `balances` and `seen` as it goes.
///
/// Rules, in order per transaction: structural shape (§ admission),
/// unique id, sufficient balance for non-reserved senders. Block-level:
/// transaction-count cap, at most one coinbase whose amount equals the
/// mining reward and whose fee is zero, and a matching `totalFees`.
fn validate_block_transactions(
    block: &Block,
    balances: &mut HashMap<String, Amount>,
    seen: &mut HashSet<String>,
    config: &NodeConfig,
) -> Result<(), NodeError> {
    if block.transactions.len() > config.max_transactions_per_block {
        return Err(NodeError::InvalidBlock(format!(
            "{} transactions exceeds cap {}",
            block.transactions.len(),
            config.max_transactions_per_block
        )));
    }

    let coinbase_count = block.transactions.iter().filter(|tx| tx.is_coinbase()).count();
    if coinbase_count > 1 {
        return Err(NodeError::InvalidBlock(format!(
            "{coinbase_count} coinbase transactions, at most 1 allowed"
        )));
    }

    for tx in &block.transactions {
        validate_shape(tx, config.min_fee)?;

        if tx.is_coinbase() {
            if tx.amount != config.mining_reward {
                return Err(NodeError::InvalidBlock(format!(
                    "coinbase amount {} does not equal mining reward {}",
                    tx.amount, config.mining_reward
                )));
            }
            if !tx.fee.is_zero() {
                return Err(NodeError::InvalidBlock("coinbase must carry zero fee".into()));
            }
        }

        if !seen.insert(tx.transaction_id.clone()) {
            return Err(NodeError::DuplicateTransaction(tx.transaction_id.clone()));
        }

        if !tx.has_reserved_sender() {
            let required = tx.amount.checked_add(tx.fee).ok_or_else(|| {
                NodeError::InvalidTransaction("amount + fee overflows".into())
            })?;
            let available = balances.get(&tx.sender).copied().unwrap_or(Amount::ZERO);
            if available < required {
                return Err(NodeError::InsufficientBalance {
                    address: tx.sender.clone(),
                    required,
                    available,
                });
            }
            balances.insert(tx.sender.clone(), available.saturating_sub(required));
        }

        let credited = balances.entry(tx.recipient.clone()).or_insert(Amount::ZERO);
        *credited = credited
            .checked_add(tx.amount)
            .ok_or_else(|| NodeError::InvalidTransaction("recipient balance overflows".into()))?;
    }

    let expected_fees = sum_fees(&block.transactions)
        .ok_or_else(|| NodeError::InvalidBlock("fee sum overflows".into()))?;
    if block.total_fees != expected_fees {
        return Err(NodeError::InvalidBlock(format!(
            "totalFees {} does not match computed {}",
            block.total_fees, expected_fees
        )));
    }

    Ok(())
}
