//! End-to-end integration tests for the Ekehi protocol.
//!
//! These exercise the full node facade the way the HTTP layer drives it:
//! transaction submission, mining, inbound block acceptance, fork
//! adoption with mempool reconciliation, peer hygiene, and persistence.
//! The scenarios mirror how heterogeneous nodes actually interact on the
//! network rather than poking at components in isolation.
//!
//! Each test stands alone with its own temporary store. No shared state,
//! no test ordering dependencies, no flaky failures.

use std::sync::Arc;

use ekehi_protocol::chain::block::{compute_block_hash, sum_fees};
use ekehi_protocol::crypto::address::{encode_address, validate_address};
use ekehi_protocol::crypto::hash::meets_difficulty;
use ekehi_protocol::error::NodeError;
use ekehi_protocol::miner::MineOutcome;
use ekehi_protocol::network::peers::PeerRecord;
use ekehi_protocol::node::Node;
use ekehi_protocol::store::Store;
use ekehi_protocol::{Amount, Block, Chain, NodeConfig, SyncOutcome, Transaction};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn addr(byte: u8) -> String {
    encode_address(&[byte; 20])
}

/// Low-difficulty config so PoW stays in the microsecond range.
fn test_config() -> NodeConfig {
    NodeConfig {
        difficulty: 1,
        miner_address: addr(200),
        ..NodeConfig::default()
    }
}

fn make_node() -> Arc<Node> {
    Node::new(
        test_config(),
        Store::open_temporary().expect("temp store"),
        vec![],
        "http://self:3000".into(),
    )
}

fn faucet_tx(to: &str, ekh: u64) -> Transaction {
    Transaction::new("FAUCET", to, Amount::from_ekh(ekh), Amount::ZERO)
}

/// Seals the next block over a tip directly, bypassing the miner. Used
/// to fabricate peer chains.
fn seal_next(tip: &Block, mut txs: Vec<Transaction>, config: &NodeConfig) -> Block {
    txs.push(Transaction::coinbase(
        config.miner_address.clone(),
        config.mining_reward,
    ));
    let index = tip.index + 1;
    let mut nonce = 0u64;
    let hash = loop {
        let candidate = compute_block_hash(&tip.hash, nonce, &txs, index);
        if meets_difficulty(&candidate, config.difficulty) {
            break candidate;
        }
        nonce += 1;
    };
    Block {
        index,
        timestamp: chrono::Utc::now().timestamp_millis() as u64,
        total_fees: sum_fees(&txs).expect("fees sum"),
        transactions: txs,
        nonce,
        hash,
        previous_block_hash: tip.hash.clone(),
        difficulty: config.difficulty,
    }
}

// ---------------------------------------------------------------------------
// 1. Genesis only
// ---------------------------------------------------------------------------

#[test]
fn genesis_only_node() {
    let node = make_node();
    let stats = node.stats();

    assert_eq!(stats.total_blocks, 1);
    assert_eq!(stats.total_supply, Amount::ZERO);
    assert_eq!(stats.total_transactions, 0);
    assert_eq!(node.chain().read().tip().index, 1);
    assert!(Chain::validate_full(node.chain().read().blocks(), node.config()).is_ok());
}

// ---------------------------------------------------------------------------
// 2. Faucet + mine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn faucet_then_mine_pays_recipient_and_miner() {
    let node = make_node();
    let recipient = addr(1);

    node.submit_transaction(faucet_tx(&recipient, 100)).unwrap();
    assert_eq!(node.mempool().size(), 1);

    let MineOutcome::Mined(block) = node.mine_now().await else {
        panic!("expected a mined block");
    };

    // Exactly two transactions, faucet first, coinbase second.
    assert_eq!(block.transactions.len(), 2);
    assert_eq!(block.transactions[0].sender, "FAUCET");
    assert!(block.transactions[1].is_coinbase());
    assert_eq!(
        block.transactions[1].amount,
        Amount::from_micro(12_500_000)
    );

    let chain = node.chain().read();
    assert_eq!(chain.balance_of(&recipient), Amount::from_ekh(100));
    assert_eq!(
        chain.balance_of(&node.config().miner_address),
        Amount::from_micro(12_500_000)
    );
}

// ---------------------------------------------------------------------------
// 3. Insufficient balance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overdraft_is_rejected_and_mempool_untouched() {
    let node = make_node();
    let a = addr(1);
    let b = addr(2);

    node.submit_transaction(faucet_tx(&a, 100)).unwrap();
    let MineOutcome::Mined(_) = node.mine_now().await else {
        panic!("expected a mined block");
    };
    assert_eq!(node.chain().read().balance_of(&a), Amount::from_ekh(100));

    let overdraft = Transaction::new(
        a.clone(),
        b,
        Amount::from_ekh(200),
        Amount::from_micro(1_000),
    );
    let err = node.submit_transaction(overdraft).unwrap_err();
    assert!(matches!(err, NodeError::InsufficientBalance { .. }));
    assert_eq!(node.mempool().size(), 0);
}

// ---------------------------------------------------------------------------
// 4. Minimum fee
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fee_floor_applies_to_normal_senders_only() {
    let node = make_node();
    let a = addr(1);
    let b = addr(2);

    node.submit_transaction(faucet_tx(&a, 100)).unwrap();
    let MineOutcome::Mined(_) = node.mine_now().await else {
        panic!("expected a mined block");
    };

    // Zero fee from a normal sender: rejected as structurally invalid.
    let free_rider = Transaction::new(a.clone(), b.clone(), Amount::from_ekh(10), Amount::ZERO);
    assert!(matches!(
        node.submit_transaction(free_rider),
        Err(NodeError::InvalidTransaction(_))
    ));

    // Same transfer at the floor: accepted.
    let paying = Transaction::new(a, b, Amount::from_ekh(10), Amount::from_micro(1_000));
    node.submit_transaction(paying).unwrap();
    assert_eq!(node.mempool().size(), 1);
}

// ---------------------------------------------------------------------------
// 5. Fork adoption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn longer_valid_fork_is_adopted_with_mempool_reconciliation() {
    let node = make_node();
    let config = test_config();

    // Local chain: genesis + 2 mined blocks (length 3).
    for i in 1..=2u8 {
        node.submit_transaction(faucet_tx(&addr(i), 10)).unwrap();
        let MineOutcome::Mined(_) = node.mine_now().await else {
            panic!("expected a mined block");
        };
    }
    assert_eq!(node.stats().total_blocks, 3);

    // Peer chain: independent history of length 5 from the same genesis.
    let genesis = node.chain().read().blocks()[0].clone();
    let mut peer_blocks = vec![genesis];
    for i in 10..14u8 {
        let block = seal_next(peer_blocks.last().unwrap(), vec![faucet_tx(&addr(i), 7)], &config);
        peer_blocks.push(block);
    }

    // One local pending transaction that is NOT on the peer chain — it
    // must survive reconciliation.
    let survivor = faucet_tx(&addr(99), 1);
    node.submit_transaction(survivor.clone()).unwrap();

    // A remote pending transaction rides along with the peer chain.
    let remote_pending = faucet_tx(&addr(98), 2);

    let outcome = node.sync_manager().adopt(
        "http://peer:3000",
        peer_blocks,
        vec![remote_pending.clone()],
        config.difficulty,
    );

    assert!(matches!(
        outcome,
        SyncOutcome::Updated {
            old_len: 3,
            new_len: 5,
            ..
        }
    ));
    assert_eq!(node.stats().total_blocks, 5);

    // The adopted chain's balances are visible; the old local history is
    // gone wholesale.
    {
        let chain = node.chain().read();
        assert_eq!(chain.balance_of(&addr(10)), Amount::from_ekh(7));
        assert_eq!(chain.balance_of(&addr(1)), Amount::ZERO);
    }

    // Mempool: local survivor and remote pending both present.
    assert!(node.mempool().contains(&survivor.transaction_id));
    assert!(node.mempool().contains(&remote_pending.transaction_id));

    // Adopting the same chain again is a no-op.
    let again = node.sync_manager().adopt(
        "http://peer:3000",
        node.chain().read().blocks().to_vec(),
        vec![],
        config.difficulty,
    );
    assert_eq!(
        again,
        SyncOutcome::Unchanged {
            reason: "not_longer"
        }
    );
}

#[test]
fn shorter_or_invalid_fork_is_refused() {
    let node = make_node();
    let config = test_config();

    // Equal-length candidate (1 block, like the fresh node): refused.
    let genesis = node.chain().read().blocks()[0].clone();
    assert_eq!(
        node.sync_manager()
            .adopt("http://peer:3000", vec![genesis.clone()], vec![], 1),
        SyncOutcome::Unchanged {
            reason: "not_longer"
        }
    );

    // Longer but corrupted candidate: refused as invalid.
    let mut blocks = vec![genesis];
    for i in 1..=2u8 {
        let block = seal_next(blocks.last().unwrap(), vec![faucet_tx(&addr(i), 1)], &config);
        blocks.push(block);
    }
    blocks[1].transactions[0].amount = Amount::from_ekh(9_999);

    assert_eq!(
        node.sync_manager().adopt("http://peer:3000", blocks, vec![], 1),
        SyncOutcome::Unchanged {
            reason: "invalid_remote_chain"
        }
    );
    assert_eq!(node.stats().total_blocks, 1);
}

// ---------------------------------------------------------------------------
// 6. Bad block rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn block_with_stale_parent_is_rejected_silently() {
    let alpha = make_node();
    alpha.submit_transaction(faucet_tx(&addr(1), 10)).unwrap();
    let MineOutcome::Mined(stale) = alpha.mine_now().await else {
        panic!("expected a mined block");
    };

    // Put beta one block ahead so alpha's block can match neither tip
    // hash nor index.
    let beta = make_node();
    beta.submit_transaction(faucet_tx(&addr(2), 10)).unwrap();
    let MineOutcome::Mined(_) = beta.mine_now().await else {
        panic!("expected a mined block");
    };

    let before = beta.stats().total_blocks;
    let err = beta.receive_block(stale).unwrap_err();
    assert!(matches!(err, NodeError::InvalidBlock(_)));
    assert_eq!(beta.stats().total_blocks, before);
}

// ---------------------------------------------------------------------------
// 7. Discovery prunes loopback
// ---------------------------------------------------------------------------

#[test]
fn loopback_peers_never_enter_and_restore_filters_them() {
    let node = make_node();

    assert!(!node.peers().add("http://127.0.0.1:5000"));
    assert!(!node.peers().add("http://localhost:4000"));
    assert!(node.peers().add("http://203.0.113.7:3000"));

    // A persisted peer file that somehow contains loopback entries is
    // scrubbed on restore.
    node.peers().restore(vec![
        PeerRecord {
            url: "http://127.0.0.1:5000".into(),
            last_seen: 0,
            last_height: 0,
            last_difficulty: 0,
            healthy: true,
            consecutive_failures: 0,
        },
        PeerRecord {
            url: "http://203.0.113.7:3000".into(),
            last_seen: 0,
            last_height: 3,
            last_difficulty: 2,
            healthy: true,
            consecutive_failures: 0,
        },
    ]);

    assert_eq!(
        node.peers().urls(),
        vec!["http://203.0.113.7:3000".to_string()]
    );
}

// ---------------------------------------------------------------------------
// Round-trips & idempotence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chain_revalidates_after_save_load_cycle() {
    let dir = tempfile::tempdir().unwrap();

    {
        let node = Node::new(
            test_config(),
            Store::open(dir.path()).unwrap(),
            vec![],
            "http://self:3000".into(),
        );
        for i in 1..=3u8 {
            node.submit_transaction(faucet_tx(&addr(i), 10)).unwrap();
            let MineOutcome::Mined(_) = node.mine_now().await else {
                panic!("expected a mined block");
            };
        }
        node.stop().await;
    }

    let reborn = Node::new(
        test_config(),
        Store::open(dir.path()).unwrap(),
        vec![],
        "http://self:3000".into(),
    );
    assert_eq!(reborn.stats().total_blocks, 4);
    Chain::validate_full(reborn.chain().read().blocks(), reborn.config()).unwrap();
}

#[test]
fn every_generated_address_validates() {
    for byte in 0..32u8 {
        assert!(validate_address(&encode_address(&[byte; 20])));
    }
}

// ---------------------------------------------------------------------------
// Difficulty boundaries
// ---------------------------------------------------------------------------

#[test]
fn difficulty_adjustment_boundaries() {
    use ekehi_protocol::miner::adjust_difficulty;

    let target = 60_000u64;
    // Fast block: just under half the target raises difficulty.
    assert_eq!(adjust_difficulty(2, target / 2 - 1, 0, target), 3);
    // Exactly half does not.
    assert_eq!(adjust_difficulty(2, target / 2, 0, target), 2);
    // Slow block: just over double lowers it.
    assert_eq!(adjust_difficulty(2, target * 2 + 1, 0, target), 1);
    // Floor holds at 1.
    assert_eq!(adjust_difficulty(1, target * 10, 0, target), 1);
}
