//! Envelope key derivation
//!
//! `key = SHA-256(trim(lowercase(identity)))`. One-time addresses carry 160
//! bits of OS randomness, so there is no salt or stretching step. Records
//! already on the ledger depend on this exact mapping, including the
//! spelling of the identity: with and without `0x` are different keys.

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::error::EnvelopeError;

pub const KEY_LEN: usize = 32;

/// Derive the envelope key for an address string.
///
/// The input is trimmed and lower-cased and hashed as written; malformed
/// addresses are rejected rather than hashed.
pub fn derive_key(identity: &str) -> Result<[u8; KEY_LEN], EnvelopeError> {
    Address::parse(identity)?;
    let normalized = identity.trim().to_lowercase();
    Ok(Sha256::digest(normalized.as_bytes()).into())
}

/// Derive the envelope key for an already parsed address, spelled in its
/// canonical `0x` form.
pub fn derive_key_for(address: &Address) -> [u8; KEY_LEN] {
    Sha256::digest(address.to_string().as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_known_vector() {
        let key = derive_key("0x52908400098527886E0F7030069857D2E4169EE7").unwrap();
        assert_eq!(
            hex::encode(key),
            "d33119d55883c5f03990cc0e8db68f2f6ebc30b638a794e9675f744b14d03334"
        );
    }

    #[test]
    fn test_unprefixed_spelling_hashed_as_written() {
        let key = derive_key("52908400098527886E0F7030069857D2E4169EE7").unwrap();
        assert_eq!(
            hex::encode(key),
            "c55e73f421578a751aad79a4a4d15f98efee6830c84984712ce9d5d9af754e73"
        );

        let address = Address::parse("52908400098527886E0F7030069857D2E4169EE7").unwrap();
        assert_ne!(key, derive_key_for(&address));
        assert_eq!(
            derive_key_for(&address),
            derive_key("0x52908400098527886e0f7030069857d2e4169ee7").unwrap()
        );
    }

    #[test]
    fn test_case_insensitive() {
        let upper = derive_key("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        let lower = derive_key("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        let padded = derive_key(" 0xabcdef0123456789abcdef0123456789abcdef01 ").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(lower, padded);
    }

    #[test]
    fn test_distinct_addresses_distinct_keys() {
        let a = derive_key("0x0000000000000000000000000000000000000001").unwrap();
        let b = derive_key("0x0000000000000000000000000000000000000002").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_rejected() {
        assert_eq!(derive_key("0xABC"), Err(EnvelopeError::InvalidIdentity));
        assert_eq!(derive_key("not an address"), Err(EnvelopeError::InvalidIdentity));
    }
}
