//! External capabilities
//!
//! The core never talks to a chain, a relayer or a wallet directly. It is
//! handed trait objects implementing these interfaces.

use std::collections::HashMap;

use async_trait::async_trait;
use privdock_envelope::Address;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
pub use crate::record::Signature;
use crate::record::{Attestation, FileSubmission, Handle, InputProof, LedgerRecord, TxReceipt};

/// Read side of the file ledger contract
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Number of files stored by `owner`
    async fn count(&self, contract: &Address, owner: &Address) -> Result<u64, LedgerError>;

    /// File at `index` in `owner`'s list
    async fn get(
        &self,
        contract: &Address,
        owner: &Address,
        index: u64,
    ) -> Result<LedgerRecord, LedgerError>;
}

/// Write side of the file ledger contract
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Chain the connected wallet is on
    fn chain_id(&self) -> u64;

    /// Send `storeFile` and wait until it is confirmed.
    ///
    /// Either the receipt is returned or nothing was persisted.
    async fn submit(
        &self,
        contract: &Address,
        submission: FileSubmission,
    ) -> Result<TxReceipt, LedgerError>;
}

/// Encrypted input bound to a `(contract, user)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handle: Handle,
    pub proof: InputProof,
}

/// Homomorphic encryption of addresses
#[async_trait]
pub trait IdentityEncryptor: Send + Sync {
    /// False while the engine is still initializing
    fn is_ready(&self) -> bool;

    async fn encrypt_identity(
        &self,
        contract: &Address,
        owner: &Address,
        value: &Address,
    ) -> Result<EncryptedInput, LedgerError>;
}

/// One-time keypair used for a single user-decryption request
#[derive(Clone, Serialize, Deserialize)]
pub struct DecryptionKeypair {
    #[serde(with = "hex")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex")]
    pub private_key: Vec<u8>,
}

impl std::fmt::Debug for DecryptionKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionKeypair")
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive() // Hides the private key
    }
}

/// A handle together with the contract that holds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleScope {
    pub handle: Handle,
    pub contract: Address,
}

/// Everything the decryption service needs for one request
#[derive(Debug, Clone)]
pub struct UserDecryptRequest {
    pub handles: Vec<HandleScope>,
    pub keypair: DecryptionKeypair,
    pub signature: Signature,
    pub contract_addresses: Vec<Address>,
    pub user: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl UserDecryptRequest {
    /// The attestation the signature is expected to cover
    pub fn attestation(&self) -> Attestation {
        Attestation {
            public_key: self.keypair.public_key.clone(),
            contract_addresses: self.contract_addresses.clone(),
            start_timestamp: self.start_timestamp,
            duration_days: self.duration_days,
        }
    }
}

/// Threshold / authorized decryption service
#[async_trait]
pub trait AuthorizedDecryptor: Send + Sync {
    fn generate_keypair(&self) -> DecryptionKeypair;

    fn build_authorization(
        &self,
        public_key: &[u8],
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Attestation;

    /// Decrypt the handles the user is allowed to see.
    ///
    /// Handles the service will not open are absent from the map.
    async fn authorized_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<HashMap<Handle, String>, LedgerError>;
}

/// The owner's wallet
#[async_trait]
pub trait AttestationSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign(&self, attestation: &Attestation) -> Result<Signature, LedgerError>;
}
