//! # Address Encoding & Validation
//!
//! An Ekehi address is `"EKH"` followed by 48 hex characters. The decoded
//! 24 bytes are a 20-byte payload and a 4-byte checksum equal to the
//! leading 4 bytes of SHA-256(payload).
//!
//! ```text
//! EKH  ┆ 40 hex chars (payload) ┆ 8 hex chars (checksum)
//!      ┆ SHA-256(key)[..20]     ┆ SHA-256(payload)[..4]
//! ```
//!
//! Two kinds of reserved sender tokens bypass the format entirely: `"00"`
//! (coinbase) and the system senders (`FAUCET`, `ECOSYSTEM`). They are
//! senders only — nothing can pay *to* a reserved token and expect to
//! spend it later, since reserved tokens have no spendable balance.
//!
//! The checksum comparison is constant-time; validation runs on
//! untrusted network input.

use subtle::ConstantTimeEq;

use crate::config::{
    ADDRESS_CHECKSUM_LEN, ADDRESS_ENCODED_LEN, ADDRESS_PAYLOAD_LEN, ADDRESS_PREFIX,
    COINBASE_SENDER, SYSTEM_SENDERS,
};
use crate::crypto::hash::sha256;
use crate::error::NodeError;

/// Encodes a 20-byte payload as an `EKH…` address with checksum.
pub fn encode_address(payload: &[u8; ADDRESS_PAYLOAD_LEN]) -> String {
    let digest = sha256(payload);
    let mut raw = Vec::with_capacity(ADDRESS_PAYLOAD_LEN + ADDRESS_CHECKSUM_LEN);
    raw.extend_from_slice(payload);
    raw.extend_from_slice(&digest[..ADDRESS_CHECKSUM_LEN]);
    format!("{}{}", ADDRESS_PREFIX, hex::encode(raw))
}

/// Validates an address string.
///
/// Accepts the coinbase token `"00"` as well as any well-formed `EKH…`
/// address with a correct checksum. System senders (`FAUCET`, …) are
/// *not* accepted here — they are a sender-side policy, not an address
/// format (see [`is_reserved_sender`]).
pub fn validate_address(address: &str) -> bool {
    if address == COINBASE_SENDER {
        return true;
    }
    let Some(hex_part) = address.strip_prefix(ADDRESS_PREFIX) else {
        return false;
    };
    if address.len() != ADDRESS_ENCODED_LEN {
        return false;
    }
    let Ok(raw) = hex::decode(hex_part) else {
        return false;
    };
    if raw.len() != ADDRESS_PAYLOAD_LEN + ADDRESS_CHECKSUM_LEN {
        return false;
    }

    let (payload, checksum) = raw.split_at(ADDRESS_PAYLOAD_LEN);
    let digest = sha256(payload);

    // Constant-time: no early exit on the first mismatching byte.
    bool::from(checksum.ct_eq(&digest[..ADDRESS_CHECKSUM_LEN]))
}

/// `true` for sender tokens that bypass address format and balance
/// checks: the coinbase token and the system senders.
pub fn is_reserved_sender(sender: &str) -> bool {
    sender == COINBASE_SENDER || SYSTEM_SENDERS.contains(&sender)
}

/// Derives an address from a 32-byte private key.
///
/// There is no signature scheme on this network — the key is an identity,
/// not a signing capability. SHA-256 of the key acts as the public
/// material, and its first 20 bytes become the address payload.
pub fn derive_address(private_key: &[u8; 32]) -> String {
    let public_material = sha256(private_key);
    let mut payload = [0u8; ADDRESS_PAYLOAD_LEN];
    payload.copy_from_slice(&public_material[..ADDRESS_PAYLOAD_LEN]);
    encode_address(&payload)
}

/// Derives an address from a hex-encoded 32-byte private key.
pub fn derive_address_from_hex(private_key_hex: &str) -> Result<String, NodeError> {
    let raw = hex::decode(private_key_hex)
        .map_err(|_| NodeError::InvalidAddress("private key is not valid hex".into()))?;
    let key: [u8; 32] = raw
        .try_into()
        .map_err(|_| NodeError::InvalidAddress("private key must be 32 bytes".into()))?;
    Ok(derive_address(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_produces_valid_address() {
        let addr = encode_address(&[7u8; 20]);
        assert!(addr.starts_with("EKH"));
        assert_eq!(addr.len(), 51);
        assert!(validate_address(&addr));
    }

    #[test]
    fn coinbase_token_is_valid() {
        assert!(validate_address("00"));
    }

    #[test]
    fn system_senders_are_not_addresses() {
        // FAUCET is a reserved *sender*, not a valid address format.
        assert!(!validate_address("FAUCET"));
        assert!(is_reserved_sender("FAUCET"));
        assert!(is_reserved_sender("ECOSYSTEM"));
        assert!(is_reserved_sender("00"));
        assert!(!is_reserved_sender("EKH"));
    }

    #[test]
    fn rejects_wrong_prefix() {
        let addr = encode_address(&[1u8; 20]);
        let tampered = addr.replacen("EKH", "XKH", 1);
        assert!(!validate_address(&tampered));
    }

    #[test]
    fn rejects_wrong_length() {
        let addr = encode_address(&[1u8; 20]);
        assert!(!validate_address(&addr[..50]));
        assert!(!validate_address(&format!("{addr}0")));
        assert!(!validate_address(""));
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let addr = encode_address(&[9u8; 20]);
        // Flip the last hex character.
        let mut bytes = addr.into_bytes();
        let last = *bytes.last().unwrap();
        *bytes.last_mut().unwrap() = if last == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(!validate_address(&tampered));
    }

    #[test]
    fn rejects_non_hex_body() {
        assert!(!validate_address(&format!("EKH{}", "z".repeat(48))));
    }

    #[test]
    fn derivation_is_deterministic() {
        let key = [42u8; 32];
        assert_eq!(derive_address(&key), derive_address(&key));
        assert!(validate_address(&derive_address(&key)));
    }

    #[test]
    fn different_keys_different_addresses() {
        assert_ne!(derive_address(&[1u8; 32]), derive_address(&[2u8; 32]));
    }

    #[test]
    fn derive_from_hex_rejects_bad_input() {
        assert!(derive_address_from_hex("not hex").is_err());
        assert!(derive_address_from_hex("ab").is_err()); // too short
        assert!(derive_address_from_hex(&"ab".repeat(32)).is_ok());
    }

    proptest! {
        #[test]
        fn any_payload_roundtrips(payload in prop::array::uniform20(any::<u8>())) {
            prop_assert!(validate_address(&encode_address(&payload)));
        }

        #[test]
        fn random_strings_do_not_validate(s in "[A-Za-z0-9]{0,60}") {
            // Astronomically unlikely to hit a valid checksum by chance;
            // the guard is for the structure checks.
            if s != "00" {
                prop_assert!(!validate_address(&s) || s.starts_with("EKH"));
            }
        }
    }
}
