//! Privdock Envelopes
//!
//! Seals a content locator under a key derived from a one-time address.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Envelope Flow                             │
//! │                                                                  │
//! │  1. Address::generate()          fresh one-time address          │
//! │  2. key = SHA-256(lower(addr))   derive_key                      │
//! │  3. AES-256-GCM(key, iv, loc)    encrypt                         │
//! │  4. "iv:tag:ciphertext"          Envelope::to_string             │
//! │                                                                  │
//! │  Whoever recovers the address recovers the locator; anybody      │
//! │  else gets AuthenticationFailed.                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod address;
pub mod codec;
pub mod error;
pub mod kdf;
pub mod locator;

pub use address::Address;
pub use codec::{Envelope, IV_LEN, TAG_LEN, decrypt, decrypt_payload, encrypt};
pub use error::EnvelopeError;
pub use kdf::{KEY_LEN, derive_key, derive_key_for};
pub use locator::{LOCATOR_PREFIX, generate_locator};
