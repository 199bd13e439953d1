//! Development wallet
//!
//! Ed25519 stand-in for the user's wallet. Its address is the first 20
//! bytes of `blake3(verifying_key)`.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use privdock_envelope::Address;
use rand::rngs::OsRng;

use crate::capability::AttestationSigner;
use crate::error::LedgerError;
use crate::record::{Attestation, Signature};

pub struct DevWallet {
    signing_key: SigningKey,
}

impl Clone for DevWallet {
    fn clone(&self) -> Self {
        Self::from_secret(self.secret_bytes())
    }
}

impl DevWallet {
    /// Generate a new random wallet
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from existing secret key bytes
    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    /// Secret key bytes (for persistence)
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn verifying_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn wallet_address(&self) -> Address {
        address_for_key(&self.verifying_key())
    }
}

impl std::fmt::Debug for DevWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevWallet")
            .field("address", &self.wallet_address())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AttestationSigner for DevWallet {
    fn address(&self) -> Address {
        self.wallet_address()
    }

    async fn sign(&self, attestation: &Attestation) -> Result<Signature, LedgerError> {
        let signature = self.signing_key.sign(&attestation.digest());
        Ok(Signature(signature.to_bytes().to_vec()))
    }
}

/// Address controlled by a verifying key
pub fn address_for_key(verifying_key: &[u8; 32]) -> Address {
    let hash = blake3::hash(verifying_key);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[..20]);
    Address::from_bytes(bytes)
}

/// Check a wallet signature over an attestation
pub fn verify_attestation(
    verifying_key: &[u8; 32],
    attestation: &Attestation,
    signature: &Signature,
) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(verifying_key) else {
        return false;
    };
    let Ok(bytes) = <[u8; 64]>::try_from(signature.as_bytes()) else {
        return false;
    };
    key.verify(
        &attestation.digest(),
        &ed25519_dalek::Signature::from_bytes(&bytes),
    )
    .is_ok()
}
