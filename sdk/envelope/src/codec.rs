//! Envelope Codec
//!
//! AES-256-GCM under a key derived from an address. The serialized form is
//! `iv:tag:ciphertext`, lowercase hex, which is what the ledger stores.

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;
use crate::kdf::derive_key;

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// A sealed locator
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Envelope {
    /// Random 96-bit nonce, fresh per call
    pub iv: [u8; IV_LEN],
    /// GCM authentication tag
    pub tag: [u8; TAG_LEN],
    /// Ciphertext without the tag
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Parse `iv:tag:ciphertext`.
    pub fn parse(payload: &str) -> Result<Self, EnvelopeError> {
        let fields: Vec<&str> = payload.trim().split(':').collect();
        let [iv_hex, tag_hex, data_hex] = fields.as_slice() else {
            return Err(EnvelopeError::MalformedEnvelope("expected three fields"));
        };
        if iv_hex.is_empty() || tag_hex.is_empty() || data_hex.is_empty() {
            return Err(EnvelopeError::MalformedEnvelope("empty field"));
        }

        let mut iv = [0u8; IV_LEN];
        hex::decode_to_slice(iv_hex, &mut iv)
            .map_err(|_| EnvelopeError::MalformedEnvelope("bad iv"))?;

        let mut tag = [0u8; TAG_LEN];
        hex::decode_to_slice(tag_hex, &mut tag)
            .map_err(|_| EnvelopeError::MalformedEnvelope("bad tag"))?;

        let ciphertext =
            hex::decode(data_hex).map_err(|_| EnvelopeError::MalformedEnvelope("bad ciphertext"))?;

        Ok(Self {
            iv,
            tag,
            ciphertext,
        })
    }
}

impl FromStr for Envelope {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Envelope {
    type Error = EnvelopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Envelope> for String {
    fn from(envelope: Envelope) -> Self {
        envelope.to_string()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            hex::encode(self.iv),
            hex::encode(self.tag),
            hex::encode(&self.ciphertext)
        )
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("iv", &hex::encode(self.iv))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Seal `plaintext` under the key derived from `identity`.
pub fn encrypt(plaintext: &str, identity: &str) -> Result<Envelope, EnvelopeError> {
    let key = derive_key(identity)?;
    if plaintext.is_empty() {
        return Err(EnvelopeError::EmptyPlaintext);
    }

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let encrypted = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| EnvelopeError::AuthenticationFailed)?;

    let split = encrypted.len() - TAG_LEN;
    let (ciphertext, tag) = encrypted.split_at(split);

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag);

    Ok(Envelope {
        iv,
        tag: tag_bytes,
        ciphertext: ciphertext.to_vec(),
    })
}

/// Open an envelope with a candidate identity.
///
/// A wrong identity, a flipped bit anywhere in the tag or ciphertext, and
/// a swapped IV all surface as `AuthenticationFailed`.
pub fn decrypt(envelope: &Envelope, identity: &str) -> Result<String, EnvelopeError> {
    let key = derive_key(identity)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));

    let mut combined = Vec::with_capacity(envelope.ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(&envelope.ciphertext);
    combined.extend_from_slice(&envelope.tag);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&envelope.iv), combined.as_slice())
        .map_err(|_| EnvelopeError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| EnvelopeError::EncodingError)
}

/// Parse a serialized envelope and open it.
pub fn decrypt_payload(payload: &str, identity: &str) -> Result<String, EnvelopeError> {
    let envelope = Envelope::parse(payload)?;
    decrypt(&envelope, identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::kdf::derive_key_for;

    const ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    #[test]
    fn test_serialized_shape() {
        let envelope = encrypt("bafy-demo-hash", ADDRESS).unwrap();
        let text = envelope.to_string();
        let fields: Vec<&str> = text.split(':').collect();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].len(), IV_LEN * 2);
        assert_eq!(fields[1].len(), TAG_LEN * 2);
        assert_eq!(fields[2].len(), "bafy-demo-hash".len() * 2);
        assert_eq!(text, text.to_lowercase());
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let a = encrypt("same", ADDRESS).unwrap();
        let b = encrypt("same", ADDRESS).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_parse_rejects_shapes() {
        for bad in [
            "not-three-parts",
            "aa:bb",
            "aa:bb:cc:dd",
            "::",
            "000102030405060708090a0b::00",
            "zz:zz:zz",
            // short iv
            "0001:ac16f144e0b35548574023c548bb3fad:6d24",
            // odd-length ciphertext
            "000102030405060708090a0b:ac16f144e0b35548574023c548bb3fad:6d2",
        ] {
            assert!(
                matches!(Envelope::parse(bad), Err(EnvelopeError::MalformedEnvelope(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_empty_plaintext_refused() {
        assert_eq!(encrypt("", ADDRESS), Err(EnvelopeError::EmptyPlaintext));
    }

    #[test]
    fn test_invalid_identity_checked_first() {
        assert_eq!(encrypt("x", "0xabc"), Err(EnvelopeError::InvalidIdentity));
        let envelope = encrypt("x", ADDRESS).unwrap();
        assert_eq!(decrypt(&envelope, "nope"), Err(EnvelopeError::InvalidIdentity));
    }

    #[test]
    fn test_non_utf8_plaintext() {
        // Seal raw bytes directly so the tag verifies but the payload is not UTF-8.
        let address = Address::parse(ADDRESS).unwrap();
        let key = derive_key_for(&address);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let iv = [7u8; IV_LEN];
        let sealed = cipher
            .encrypt(Nonce::from_slice(&iv), [0xffu8, 0xfe].as_slice())
            .unwrap();
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let envelope = Envelope {
            iv,
            tag: tag.try_into().unwrap(),
            ciphertext: ciphertext.to_vec(),
        };
        assert_eq!(decrypt(&envelope, ADDRESS), Err(EnvelopeError::EncodingError));
    }
}
