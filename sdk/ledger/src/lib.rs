//! Privdock Ledger
//!
//! What the core needs from the outside world, and nothing more:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  LedgerReader         count / get per (contract, owner)           │
//! │  LedgerWriter         submit storeFile, await confirmation        │
//! │  IdentityEncryptor    FHE-encrypt an address -> (handle, proof)   │
//! │  AuthorizedDecryptor  keypair + attestation -> handle -> address  │
//! │  AttestationSigner    the owner's wallet                          │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `MemoryLedger`, `MockFhe` and `DevWallet` implement all of them in
//! process for tests and local development.

pub mod capability;
pub mod error;
pub mod memory;
pub mod mock_fhe;
pub mod record;
pub mod wallet;

pub use capability::{
    AttestationSigner, AuthorizedDecryptor, DecryptionKeypair, EncryptedInput, HandleScope,
    IdentityEncryptor, LedgerReader, LedgerWriter, Signature, UserDecryptRequest,
};
pub use error::LedgerError;
pub use memory::{LedgerSnapshot, MemoryLedger, ScopedFiles};
pub use mock_fhe::{AclEntry, FheSnapshot, MAX_DURATION_DAYS, MockFhe};
pub use record::{Attestation, FileSubmission, Handle, InputProof, LedgerRecord, TxReceipt};
pub use wallet::DevWallet;

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
