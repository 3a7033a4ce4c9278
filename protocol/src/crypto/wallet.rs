//! # Wallet
//!
//! Key generation for the `/wallet/new` endpoint. A wallet on this network
//! is a key-to-address mapping and nothing more — there are no signatures,
//! so holding the private key is purely an identity claim.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crypto::address::{derive_address, derive_address_from_hex};
use crate::error::NodeError;

/// A freshly generated key-identity pair.
///
/// The private key is returned to the caller exactly once and never
/// stored by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Hex-encoded 32-byte private key.
    pub private_key: String,
    /// Derived `EKH…` address.
    pub address: String,
}

impl Wallet {
    /// Generates a wallet from OS randomness.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self {
            address: derive_address(&key),
            private_key: hex::encode(key),
        }
    }

    /// Reconstructs a wallet from an existing hex private key.
    pub fn from_private_key_hex(private_key_hex: &str) -> Result<Self, NodeError> {
        let address = derive_address_from_hex(private_key_hex)?;
        Ok(Self {
            private_key: private_key_hex.to_string(),
            address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::address::validate_address;

    #[test]
    fn generated_wallet_has_valid_address() {
        let wallet = Wallet::generate();
        assert_eq!(wallet.private_key.len(), 64);
        assert!(validate_address(&wallet.address));
    }

    #[test]
    fn generation_is_not_deterministic() {
        // Two wallets from the same RNG source must differ.
        let a = Wallet::generate();
        let b = Wallet::generate();
        assert_ne!(a.private_key, b.private_key);
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn reimport_reproduces_the_address() {
        let wallet = Wallet::generate();
        let reimported = Wallet::from_private_key_hex(&wallet.private_key).unwrap();
        assert_eq!(reimported.address, wallet.address);
    }
}
