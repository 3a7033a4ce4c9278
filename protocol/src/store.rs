//! # Store — Durable Node State
//!
//! The persistence layer, built on sled's embedded log-structured
//! key-value engine. Four well-known keys, each holding one compact
//! JSON record:
//!
//! | Key       | Value                              |
//! |-----------|------------------------------------|
//! | `chain`   | the full block array               |
//! | `mempool` | pending transactions               |
//! | `peers`   | peer records                       |
//! | `config`  | the node's [`crate::config::NodeConfig`] |
//!
//! JSON (not a binary codec) because the on-disk shape doubles as the
//! migration format: any implementation that speaks the wire JSON can
//! read another node's data directory.
//!
//! ## Contract
//!
//! `save` is best-effort durable: writes are serialized through a mutex
//! and flushed, but a failing store must never block logical progress —
//! callers log and continue on in-memory state. Readers at startup
//! treat missing keys as empty. Opening retries with backoff; if the
//! store cannot be opened at all, startup fails (the binary exits
//! non-zero rather than running a node that would lose its chain on
//! restart).

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The four persisted sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// The canonical chain.
    Chain,
    /// Pending transactions.
    Mempool,
    /// Known peer records.
    Peers,
    /// Node configuration.
    Config,
}

impl Section {
    /// The store key for this section.
    pub fn key(self) -> &'static str {
        match self {
            Self::Chain => "chain",
            Self::Mempool => "mempool",
            Self::Peers => "peers",
            Self::Config => "config",
        }
    }
}

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Durable key/value store for node state.
///
/// sled handles concurrent reads internally; writes additionally go
/// through [`Store::write_lock`] so that two subsystems persisting at
/// the same time cannot interleave partial section updates.
pub struct Store {
    db: sled::Db,
    write_lock: Mutex<()>,
}

impl Store {
    /// Opens (or creates) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// In-memory store that evaporates on drop. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Opens the store, retrying with doubling backoff.
    ///
    /// Used at startup, where a transiently locked data directory (e.g.
    /// the previous process still flushing) is worth waiting out. After
    /// `attempts` failures the last error is returned and the caller is
    /// expected to abort startup.
    pub fn open_with_retries<P: AsRef<Path>>(
        path: P,
        attempts: u32,
        base_delay: Duration,
    ) -> StoreResult<Self> {
        let mut delay = base_delay;
        let mut last_err = None;

        for attempt in 1..=attempts.max(1) {
            match Self::open(path.as_ref()) {
                Ok(store) => {
                    if attempt > 1 {
                        info!(attempt, "store opened after retry");
                    }
                    return Ok(store);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "store open failed");
                    last_err = Some(e);
                    if attempt < attempts {
                        std::thread::sleep(delay);
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_err.expect("at least one attempt was made"))
    }

    /// Persists a section as compact JSON and flushes.
    pub fn save<T: Serialize>(&self, section: Section, value: &T) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock();
        self.db.insert(section.key(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Loads a section. `None` if the key has never been written —
    /// callers treat that as empty state, not an error.
    pub fn load<T: DeserializeOwned>(&self, section: Section) -> StoreResult<Option<T>> {
        match self.db.get(section.key())? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Blocks until all pending writes are on disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Amount, Chain, Transaction};
    use crate::config::NodeConfig;

    #[test]
    fn missing_sections_load_as_none() {
        let store = Store::open_temporary().unwrap();
        let chain: Option<Chain> = store.load(Section::Chain).unwrap();
        assert!(chain.is_none());
        let mempool: Option<Vec<Transaction>> = store.load(Section::Mempool).unwrap();
        assert!(mempool.is_none());
    }

    #[test]
    fn chain_roundtrip() {
        let store = Store::open_temporary().unwrap();
        let chain = Chain::new();

        store.save(Section::Chain, &chain).unwrap();
        let loaded: Chain = store.load(Section::Chain).unwrap().expect("chain saved");
        assert_eq!(loaded.blocks(), chain.blocks());
    }

    #[test]
    fn config_roundtrip() {
        let store = Store::open_temporary().unwrap();
        let config = NodeConfig {
            difficulty: 3,
            ..NodeConfig::default()
        };

        store.save(Section::Config, &config).unwrap();
        let loaded: NodeConfig = store.load(Section::Config).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn mempool_roundtrip() {
        let store = Store::open_temporary().unwrap();
        let txs = vec![Transaction::new(
            "FAUCET",
            crate::crypto::address::encode_address(&[1u8; 20]),
            Amount::from_ekh(5),
            Amount::ZERO,
        )];

        store.save(Section::Mempool, &txs).unwrap();
        let loaded: Vec<Transaction> = store.load(Section::Mempool).unwrap().unwrap();
        assert_eq!(loaded, txs);
    }

    #[test]
    fn saved_records_are_json() {
        // The on-disk shape is the migration contract — assert it stays
        // JSON with the wire field names.
        let store = Store::open_temporary().unwrap();
        store.save(Section::Config, &NodeConfig::default()).unwrap();

        let raw = store.db.get("config").unwrap().unwrap();
        let text = std::str::from_utf8(&raw).unwrap();
        assert!(text.starts_with('{'));
        assert!(text.contains("\"minerAddress\""));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            store.save(Section::Config, &NodeConfig::default()).unwrap();
        }
        let store = Store::open(dir.path()).unwrap();
        let loaded: Option<NodeConfig> = store.load(Section::Config).unwrap();
        assert_eq!(loaded, Some(NodeConfig::default()));
    }

    #[test]
    fn open_with_retries_succeeds_first_try() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            Store::open_with_retries(dir.path(), 3, Duration::from_millis(1)).unwrap();
        store.save(Section::Config, &NodeConfig::default()).unwrap();
    }

    #[test]
    fn overwrite_replaces_section() {
        let store = Store::open_temporary().unwrap();
        store
            .save(Section::Config, &NodeConfig { difficulty: 1, ..NodeConfig::default() })
            .unwrap();
        store
            .save(Section::Config, &NodeConfig { difficulty: 9, ..NodeConfig::default() })
            .unwrap();

        let loaded: NodeConfig = store.load(Section::Config).unwrap().unwrap();
        assert_eq!(loaded.difficulty, 9);
    }
}
