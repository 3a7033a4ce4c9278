//! Cryptographic primitives: the hashing function, the address format,
//! and key-identity wallets. Deliberately small — this network has no
//! signature scheme, so there is nothing else to put here.

pub mod address;
pub mod hash;
pub mod wallet;

pub use address::{
    derive_address, derive_address_from_hex, encode_address, is_reserved_sender, validate_address,
};
pub use hash::{meets_difficulty, sha256, sha256_hex};
pub use wallet::Wallet;
