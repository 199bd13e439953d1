//! Mock FHE service
//!
//! In-process stand-in for the homomorphic-encryption engine and its
//! user-decryption relayer. Handles are random-looking ids; the plaintext
//! lives in an ACL table and is only released through a signed, scoped,
//! time-bounded request, mirroring what the real service enforces.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use privdock_envelope::Address;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::capability::{
    AuthorizedDecryptor, DecryptionKeypair, EncryptedInput, IdentityEncryptor, UserDecryptRequest,
};
use crate::error::LedgerError;
use crate::record::{Attestation, Handle, InputProof};
use crate::unix_now;
use crate::wallet::{DevWallet, address_for_key, verify_attestation};

/// Longest authorization window the service accepts
pub const MAX_DURATION_DAYS: u64 = 365;

/// Who may decrypt a handle, and what it decrypts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub contract: Address,
    pub owner: Address,
    pub value: Address,
    #[serde(default)]
    pub revoked: bool,
}

/// Serializable state of a [`MockFhe`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FheSnapshot {
    #[serde(with = "hex")]
    pub proof_key: [u8; 32],
    pub nonce: u64,
    pub ciphertexts: Vec<(Handle, AclEntry)>,
    pub wallets: Vec<String>,
}

pub struct MockFhe {
    ready: AtomicBool,
    /// Keys input proofs so the ledger can check them
    proof_key: [u8; 32],
    nonce: AtomicU64,
    ciphertexts: DashMap<Handle, AclEntry>,
    /// Registered wallet verifying keys by address
    wallets: DashMap<Address, [u8; 32]>,
}

impl Default for MockFhe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFhe {
    pub fn new() -> Self {
        let mut proof_key = [0u8; 32];
        OsRng.fill_bytes(&mut proof_key);
        Self {
            ready: AtomicBool::new(true),
            proof_key,
            nonce: AtomicU64::new(0),
            ciphertexts: DashMap::new(),
            wallets: DashMap::new(),
        }
    }

    /// Simulate the engine still loading (or finished loading)
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make a wallet's signatures verifiable
    pub fn register_wallet(&self, wallet: &DevWallet) {
        let key = wallet.verifying_key();
        self.wallets.insert(address_for_key(&key), key);
    }

    /// Drop decryption rights on a handle. Returns false if unknown.
    pub fn revoke(&self, handle: &Handle) -> bool {
        match self.ciphertexts.get_mut(handle) {
            Some(mut entry) => {
                entry.revoked = true;
                true
            }
            None => false,
        }
    }

    pub fn handle_count(&self) -> usize {
        self.ciphertexts.len()
    }

    /// Check an input proof the way the contract does before accepting a
    /// handle from `sender`.
    pub fn verify_input(
        &self,
        contract: &Address,
        sender: &Address,
        handle: &Handle,
        proof: &InputProof,
    ) -> bool {
        let Some(entry) = self.ciphertexts.get(handle) else {
            return false;
        };
        entry.contract == *contract
            && entry.owner == *sender
            && proof.as_bytes() == self.input_proof(handle, contract, sender).as_slice()
    }

    fn input_proof(&self, handle: &Handle, contract: &Address, owner: &Address) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(handle.as_bytes());
        hasher.update(contract.as_bytes());
        hasher.update(owner.as_bytes());
        *hasher.finalize().as_bytes()
    }

    fn check_authorization(&self, request: &UserDecryptRequest) -> Result<(), LedgerError> {
        let derived = blake3::hash(&request.keypair.private_key);
        if derived.as_bytes().as_slice() != request.keypair.public_key.as_slice() {
            return Err(LedgerError::Rejected("keypair mismatch".into()));
        }

        if request.duration_days == 0 || request.duration_days > MAX_DURATION_DAYS {
            return Err(LedgerError::Rejected("invalid authorization window".into()));
        }

        let attestation = request.attestation();
        if !attestation.is_live_at(unix_now()) {
            return Err(LedgerError::Rejected("authorization expired".into()));
        }

        let key = self
            .wallets
            .get(&request.user)
            .map(|k| *k)
            .ok_or_else(|| LedgerError::Rejected("unknown signer".into()))?;
        if !verify_attestation(&key, &attestation, &request.signature) {
            return Err(LedgerError::Rejected("invalid signature".into()));
        }

        Ok(())
    }

    pub fn snapshot(&self) -> FheSnapshot {
        FheSnapshot {
            proof_key: self.proof_key,
            nonce: self.nonce.load(Ordering::SeqCst),
            ciphertexts: self
                .ciphertexts
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            wallets: self.wallets.iter().map(|e| hex::encode(e.value())).collect(),
        }
    }

    pub fn from_snapshot(snapshot: FheSnapshot) -> Self {
        let wallets = DashMap::new();
        for key_hex in snapshot.wallets {
            let mut key = [0u8; 32];
            if hex::decode_to_slice(&key_hex, &mut key).is_ok() {
                wallets.insert(address_for_key(&key), key);
            }
        }

        Self {
            ready: AtomicBool::new(true),
            proof_key: snapshot.proof_key,
            nonce: AtomicU64::new(snapshot.nonce),
            ciphertexts: snapshot.ciphertexts.into_iter().collect(),
            wallets,
        }
    }
}

#[async_trait]
impl IdentityEncryptor for MockFhe {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn encrypt_identity(
        &self,
        contract: &Address,
        owner: &Address,
        value: &Address,
    ) -> Result<EncryptedInput, LedgerError> {
        if !self.is_ready() {
            return Err(LedgerError::Unavailable("encryption engine loading".into()));
        }

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(b"handle");
        hasher.update(&nonce.to_le_bytes());
        hasher.update(contract.as_bytes());
        hasher.update(owner.as_bytes());
        let handle = Handle(hasher.finalize().as_bytes().to_vec());

        self.ciphertexts.insert(
            handle.clone(),
            AclEntry {
                contract: *contract,
                owner: *owner,
                value: *value,
                revoked: false,
            },
        );

        let proof = InputProof(self.input_proof(&handle, contract, owner).to_vec());
        Ok(EncryptedInput { handle, proof })
    }
}

#[async_trait]
impl AuthorizedDecryptor for MockFhe {
    fn generate_keypair(&self) -> DecryptionKeypair {
        let mut private_key = [0u8; 32];
        OsRng.fill_bytes(&mut private_key);
        DecryptionKeypair {
            public_key: blake3::hash(&private_key).as_bytes().to_vec(),
            private_key: private_key.to_vec(),
        }
    }

    fn build_authorization(
        &self,
        public_key: &[u8],
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Attestation {
        Attestation {
            public_key: public_key.to_vec(),
            contract_addresses: contracts.to_vec(),
            start_timestamp,
            duration_days,
        }
    }

    async fn authorized_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<HashMap<Handle, String>, LedgerError> {
        self.check_authorization(&request)?;

        let mut results = HashMap::new();
        for pair in &request.handles {
            if !request.contract_addresses.contains(&pair.contract) {
                continue;
            }
            let Some(entry) = self.ciphertexts.get(&pair.handle) else {
                continue;
            };
            if entry.revoked || entry.contract != pair.contract || entry.owner != request.user {
                continue;
            }
            results.insert(pair.handle.clone(), entry.value.to_string());
        }
        Ok(results)
    }
}
