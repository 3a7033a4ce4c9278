//! # Hashing Primitive
//!
//! SHA-256 everywhere. Block hashes, transaction material, and address
//! checksums all go through the two functions in this module, so there is
//! exactly one place where the hash function could ever be swapped — and
//! swapping it is a hard fork, so don't.

use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of arbitrary bytes, hex-encoded (lowercase, 64 chars).
///
/// This is the representation used for block hashes on the wire and on
/// disk.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Returns `true` if `hash_hex` has at least `difficulty` leading `'0'`
/// hex characters — the proof-of-work acceptance predicate.
///
/// A difficulty larger than the hash length can never be met.
pub fn meets_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;
    if required > hash_hex.len() {
        return false;
    }
    hash_hex.bytes().take(required).all(|b| b == b'0')
}
