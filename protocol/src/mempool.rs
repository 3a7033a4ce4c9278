//! # Mempool
//!
//! Thread-safe set of admitted-but-unmined transactions. Two indices:
//! an insertion-ordered list (mining pulls transactions in arrival
//! order — block inclusion order *is* admission order on this network)
//! and a `DashMap` id index for O(1) duplicate detection on the gossip
//! hot path.
//!
//! ## Admission
//!
//! [`Mempool::admit`] is the single gate for every externally submitted
//! transaction, whether it arrived on `/transaction`, the broadcast
//! endpoint, or a peer forward. It applies the full rule set — shape,
//! addresses, fee floor, duplicate id against both pool and chain,
//! sufficient balance against current chain state — and returns a typed
//! error naming exactly which rule failed.
//!
//! Transactions leave the pool on block inclusion
//! ([`Mempool::evict_confirmed`]) or when a chain replacement
//! reconciles the pool against the adopted chain
//! ([`Mempool::reconcile_after_replace`]).

use std::collections::HashSet;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::chain::transaction::validate_shape;
use crate::chain::{Block, Chain, Transaction};
use crate::config::NodeConfig;
use crate::error::NodeError;

/// The pending transaction pool.
pub struct Mempool {
    /// Pending transactions in admission order.
    pending: RwLock<Vec<Transaction>>,
    /// Id index for cheap duplicate checks.
    ids: DashMap<String, ()>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    /// Creates an empty mempool.
    pub fn new() -> Self {
        Self {
            pending: RwLock::new(Vec::new()),
            ids: DashMap::new(),
        }
    }

    /// Admits a transaction after running the full validation gauntlet.
    ///
    /// Checks, in order:
    ///
    /// 1. Structural shape (addresses, positive amount, fee floor) —
    ///    see [`validate_shape`].
    /// 2. Not a coinbase — reward transactions are mined, never submitted.
    /// 3. No duplicate id in the pool or on the chain.
    /// 4. For non-reserved senders, `balance(sender) >= amount + fee`
    ///    against current chain state. Pending spends are deliberately
    ///    not counted — the block validator settles over-commitment at
    ///    mining time.
    pub fn admit(
        &self,
        tx: Transaction,
        chain: &Chain,
        config: &NodeConfig,
    ) -> Result<(), NodeError> {
        validate_shape(&tx, config.min_fee)?;

        if tx.is_coinbase() {
            return Err(NodeError::InvalidTransaction(
                "coinbase transactions cannot be submitted".into(),
            ));
        }

        // Hold the write lock across the duplicate check and the insert
        // so two concurrent submissions of the same id cannot both pass.
        let mut pending = self.pending.write();

        if self.ids.contains_key(&tx.transaction_id) || chain.contains_transaction(&tx.transaction_id)
        {
            return Err(NodeError::DuplicateTransaction(tx.transaction_id));
        }

        if !tx.has_reserved_sender() {
            let required = tx
                .amount
                .checked_add(tx.fee)
                .ok_or_else(|| NodeError::InvalidTransaction("amount + fee overflows".into()))?;
            let available = chain.balance_of(&tx.sender);
            if available < required {
                return Err(NodeError::InsufficientBalance {
                    address: tx.sender.clone(),
                    required,
                    available,
                });
            }
        }

        self.ids.insert(tx.transaction_id.clone(), ());
        pending.push(tx);
        Ok(())
    }

    /// Returns up to `n` transactions in admission order, without
    /// removing them. The miner takes a snapshot here; eviction happens
    /// only once the block actually lands, so a cancelled PoW run never
    /// loses transactions.
    pub fn take(&self, n: usize) -> Vec<Transaction> {
        self.pending.read().iter().take(n).cloned().collect()
    }

    /// Removes every pool entry whose id appears in the given block.
    /// Returns the number evicted.
    pub fn evict_confirmed(&self, block: &Block) -> usize {
        let confirmed: HashSet<&str> = block
            .transactions
            .iter()
            .map(|tx| tx.transaction_id.as_str())
            .collect();

        let mut pending = self.pending.write();
        let before = pending.len();
        pending.retain(|tx| {
            let keep = !confirmed.contains(tx.transaction_id.as_str());
            if !keep {
                self.ids.remove(&tx.transaction_id);
            }
            keep
        });
        before - pending.len()
    }

    /// Rebuilds the pool after a chain replacement: the union of the
    /// local pool and the adopting peer's pending set, minus everything
    /// now confirmed on the adopted chain, de-duplicated by id. Local
    /// entries keep their admission order; surviving remote entries are
    /// appended after them.
    pub fn reconcile_after_replace(
        &self,
        adopted_ids: &HashSet<String>,
        remote_pending: Vec<Transaction>,
    ) {
        let mut pending = self.pending.write();

        let mut merged: Vec<Transaction> = Vec::with_capacity(pending.len() + remote_pending.len());
        let mut seen: HashSet<String> = HashSet::new();

        for tx in pending.drain(..).chain(remote_pending) {
            if adopted_ids.contains(&tx.transaction_id) || !seen.insert(tx.transaction_id.clone()) {
                continue;
            }
            merged.push(tx);
        }

        self.ids.clear();
        for tx in &merged {
            self.ids.insert(tx.transaction_id.clone(), ());
        }
        *pending = merged;
    }

    /// Clones the entire pool, in admission order.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.pending.read().clone()
    }

    /// Replaces the pool contents wholesale. Used when loading persisted
    /// state at startup and when rolling back a failed chain replace.
    pub fn restore(&self, transactions: Vec<Transaction>) {
        let mut pending = self.pending.write();
        self.ids.clear();
        for tx in &transactions {
            self.ids.insert(tx.transaction_id.clone(), ());
        }
        *pending = transactions;
    }

    /// `true` if a transaction with this id is pending.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Number of pending transactions.
    pub fn size(&self) -> usize {
        self.pending.read().len()
    }

    /// `true` if there is nothing to mine.
    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Amount;
    use crate::crypto::address::encode_address;

    fn addr(byte: u8) -> String {
        encode_address(&[byte; 20])
    }

    fn config() -> NodeConfig {
        NodeConfig::default()
    }

    fn faucet_tx(to: u8, ekh: u64) -> Transaction {
        Transaction::new("FAUCET", addr(to), Amount::from_ekh(ekh), Amount::ZERO)
    }

    // -- Admission ----------------------------------------------------------

    #[test]
    fn admits_reserved_sender_without_balance() {
        let pool = Mempool::new();
        let chain = Chain::new();

        pool.admit(faucet_tx(1, 100), &chain, &config()).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn rejects_duplicate_in_pool() {
        let pool = Mempool::new();
        let chain = Chain::new();
        let tx = faucet_tx(1, 100);

        pool.admit(tx.clone(), &chain, &config()).unwrap();
        assert!(matches!(
            pool.admit(tx, &chain, &config()),
            Err(NodeError::DuplicateTransaction(_))
        ));
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn rejects_insufficient_balance() {
        let pool = Mempool::new();
        let chain = Chain::new(); // nobody has any balance
        let tx = Transaction::new(
            addr(1),
            addr(2),
            Amount::from_ekh(10),
            Amount::from_micro(1_000),
        );

        let err = pool.admit(tx, &chain, &config()).unwrap_err();
        assert!(matches!(err, NodeError::InsufficientBalance { .. }));
        assert!(pool.is_empty());
    }

    #[test]
    fn rejects_fee_below_floor() {
        let pool = Mempool::new();
        let chain = Chain::new();
        let tx = Transaction::new(addr(1), addr(2), Amount::from_ekh(10), Amount::ZERO);

        assert!(matches!(
            pool.admit(tx, &chain, &config()),
            Err(NodeError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn rejects_submitted_coinbase() {
        let pool = Mempool::new();
        let chain = Chain::new();
        let tx = Transaction::coinbase(addr(1), Amount::from_micro(12_500_000));

        assert!(matches!(
            pool.admit(tx, &chain, &config()),
            Err(NodeError::InvalidTransaction(_))
        ));
    }

    // -- take / evict --------------------------------------------------------

    #[test]
    fn take_preserves_admission_order_without_removal() {
        let pool = Mempool::new();
        let chain = Chain::new();

        let txs: Vec<Transaction> = (1..=3).map(|i| faucet_tx(i, i as u64)).collect();
        for tx in &txs {
            pool.admit(tx.clone(), &chain, &config()).unwrap();
        }

        let taken = pool.take(2);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].transaction_id, txs[0].transaction_id);
        assert_eq!(taken[1].transaction_id, txs[1].transaction_id);
        // take() is a snapshot, not a drain.
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn evict_confirmed_removes_included_ids() {
        let pool = Mempool::new();
        let chain = Chain::new();

        let tx1 = faucet_tx(1, 10);
        let tx2 = faucet_tx(2, 20);
        pool.admit(tx1.clone(), &chain, &config()).unwrap();
        pool.admit(tx2.clone(), &chain, &config()).unwrap();

        let mut block = Block::genesis();
        block.transactions = vec![tx1.clone()];

        assert_eq!(pool.evict_confirmed(&block), 1);
        assert!(!pool.contains(&tx1.transaction_id));
        assert!(pool.contains(&tx2.transaction_id));
    }

    // -- Reconciliation ------------------------------------------------------

    #[test]
    fn reconcile_merges_and_filters() {
        let pool = Mempool::new();
        let chain = Chain::new();

        let local_kept = faucet_tx(1, 1);
        let local_confirmed = faucet_tx(2, 2);
        pool.admit(local_kept.clone(), &chain, &config()).unwrap();
        pool.admit(local_confirmed.clone(), &chain, &config()).unwrap();

        let remote_new = faucet_tx(3, 3);
        let remote_dup = local_kept.clone();

        let adopted_ids: HashSet<String> =
            [local_confirmed.transaction_id.clone()].into_iter().collect();

        pool.reconcile_after_replace(&adopted_ids, vec![remote_dup, remote_new.clone()]);

        let remaining = pool.snapshot();
        let ids: Vec<&str> = remaining.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                local_kept.transaction_id.as_str(),
                remote_new.transaction_id.as_str()
            ]
        );
        assert!(!pool.contains(&local_confirmed.transaction_id));
    }

    #[test]
    fn restore_replaces_contents() {
        let pool = Mempool::new();
        let chain = Chain::new();
        pool.admit(faucet_tx(1, 1), &chain, &config()).unwrap();

        let replacement = vec![faucet_tx(2, 2), faucet_tx(3, 3)];
        pool.restore(replacement.clone());

        assert_eq!(pool.size(), 2);
        assert!(pool.contains(&replacement[0].transaction_id));
        assert!(pool.contains(&replacement[1].transaction_id));
    }

    // -- Concurrency ---------------------------------------------------------

    #[test]
    fn concurrent_admission_is_consistent() {
        use std::sync::Arc;
        use std::thread;

        let pool = Arc::new(Mempool::new());
        let chain = Arc::new(Chain::new());

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                let chain = Arc::clone(&chain);
                thread::spawn(move || {
                    for j in 0..20u64 {
                        let _ = pool.admit(faucet_tx(i, j + 1), &chain, &config());
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().expect("admission thread panicked");
        }

        // Every admitted transaction is indexed exactly once.
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.len(), pool.size());
        let unique: HashSet<&str> = snapshot.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(unique.len(), snapshot.len());
    }
}
