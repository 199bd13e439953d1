//! Reveal Pipeline
//!
//! Recovers the one-time address behind a record's identity handle through
//! an authorized user decryption, then opens the envelope with it.
//!
//! ```text
//!  Hidden ──▶ Revealing ──┬──▶ Revealed { identity, locator }
//!                         └──▶ Failed { kind, reason }
//!
//!  Revealed / Failed ──(trigger again)──▶ Revealing
//! ```
//!
//! Every attempt uses a fresh decryption keypair and a freshly signed
//! attestation, and the whole round-trip runs under a timeout so a slot can
//! never stay `Revealing` forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use privdock_config::DockConfig;
use privdock_envelope::{Address, Envelope};
use privdock_ledger::{
    AttestationSigner, AuthorizedDecryptor, Handle, HandleScope, LedgerError, LedgerRecord,
    UserDecryptRequest, unix_now,
};
use tracing::{debug, warn};

use crate::error::{DockError, ErrorKind};

#[derive(Debug, Clone)]
pub struct RevealConfig {
    /// Limit on the interactive authorization round-trip
    pub timeout: Duration,
    /// Validity window of the signed authorization
    pub authorization_days: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            authorization_days: 7,
        }
    }
}

impl RevealConfig {
    pub fn from_config(config: &DockConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.reveal.timeout_secs),
            authorization_days: config.reveal.authorization_days,
        }
    }
}

/// Local reveal state of one ledger record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RevealState {
    #[default]
    Hidden,
    Revealing,
    Revealed {
        identity: Address,
        locator: String,
    },
    Failed {
        kind: ErrorKind,
        /// User-safe description
        reason: String,
    },
}

impl RevealState {
    pub fn failed(error: &DockError) -> Self {
        RevealState::Failed {
            kind: error.kind(),
            reason: error.user_message(),
        }
    }

    pub fn is_revealing(&self) -> bool {
        matches!(self, RevealState::Revealing)
    }

    /// `Revealed` or `Failed`
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            RevealState::Revealed { .. } | RevealState::Failed { .. }
        )
    }
}

/// What a successful reveal recovers
#[derive(Clone, PartialEq, Eq)]
pub struct Recovered {
    pub identity: Address,
    pub locator: String,
}

impl std::fmt::Debug for Recovered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recovered").finish_non_exhaustive()
    }
}

pub struct Revealer {
    decryptor: Arc<dyn AuthorizedDecryptor>,
    signer: Arc<dyn AttestationSigner>,
    config: RevealConfig,
}

impl Revealer {
    pub fn new(
        decryptor: Arc<dyn AuthorizedDecryptor>,
        signer: Arc<dyn AttestationSigner>,
        config: RevealConfig,
    ) -> Self {
        Self {
            decryptor,
            signer,
            config,
        }
    }

    /// Identity the decryption requests are made for
    pub fn user(&self) -> Address {
        self.signer.address()
    }

    pub fn config(&self) -> &RevealConfig {
        &self.config
    }

    /// Run one reveal attempt and fold the outcome into a state.
    pub async fn reveal(&self, record: &LedgerRecord, contract: &Address) -> RevealState {
        match self.try_reveal(record, contract).await {
            Ok(Recovered { identity, locator }) => RevealState::Revealed { identity, locator },
            Err(e) => {
                warn!(
                    "Reveal of '{}' ({}) failed: {}",
                    record.name,
                    record.identity_handle.short(),
                    e.kind()
                );
                debug!("Reveal failure detail: {}", e);
                RevealState::failed(&e)
            }
        }
    }

    /// Recover the one-time address and open the record's envelope.
    pub async fn try_reveal(
        &self,
        record: &LedgerRecord,
        contract: &Address,
    ) -> Result<Recovered, DockError> {
        let envelope = Envelope::parse(&record.envelope)?;

        let identity = match tokio::time::timeout(
            self.config.timeout,
            self.recover_identity(&record.identity_handle, contract),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(DockError::Timeout {
                    stage: "authorized decryption",
                    after: self.config.timeout,
                });
            }
        };

        let locator = privdock_envelope::decrypt(&envelope, &identity.to_string())?;
        Ok(Recovered { identity, locator })
    }

    async fn recover_identity(
        &self,
        handle: &Handle,
        contract: &Address,
    ) -> Result<Address, DockError> {
        let keypair = self.decryptor.generate_keypair();
        let contracts = vec![*contract];
        let start_timestamp = unix_now();
        let attestation = self.decryptor.build_authorization(
            &keypair.public_key,
            &contracts,
            start_timestamp,
            self.config.authorization_days,
        );

        let signature = self
            .signer
            .sign(&attestation)
            .await
            .map_err(denied_or_transport)?;

        let request = UserDecryptRequest {
            handles: vec![HandleScope {
                handle: handle.clone(),
                contract: *contract,
            }],
            keypair,
            signature,
            contract_addresses: contracts,
            user: self.signer.address(),
            start_timestamp,
            duration_days: self.config.authorization_days,
        };

        debug!("Requesting user decryption of {}", handle.short());
        let mut results: HashMap<Handle, String> = self
            .decryptor
            .authorized_decrypt(request)
            .await
            .map_err(denied_or_transport)?;

        let value = results
            .remove(handle)
            .ok_or(DockError::AuthorizationDenied)?;
        Address::parse(&value).map_err(|_| {
            debug!("Decryption service returned a value that is not an address");
            DockError::AuthorizationDenied
        })
    }
}

/// A refused signature or decryption request is a denial, anything else is
/// the network.
fn denied_or_transport(e: LedgerError) -> DockError {
    debug!("Authorization round-trip failed: {}", e);
    match e {
        LedgerError::Rejected(_) => DockError::AuthorizationDenied,
        other => DockError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use privdock_ledger::{DevWallet, IdentityEncryptor, MockFhe};

    async fn sealed_record(fhe: &MockFhe, owner: &Address, contract: &Address) -> LedgerRecord {
        let ephemeral = Address::generate();
        let envelope = privdock_envelope::encrypt("bafy-demo-hash", &ephemeral.to_string())
            .unwrap()
            .to_string();
        let input = fhe
            .encrypt_identity(contract, owner, &ephemeral)
            .await
            .unwrap();
        LedgerRecord {
            name: "demo.txt".into(),
            envelope,
            identity_handle: input.handle,
            timestamp: unix_now(),
        }
    }

    fn setup() -> (Arc<MockFhe>, Arc<DevWallet>, Revealer) {
        let fhe = Arc::new(MockFhe::new());
        let wallet = Arc::new(DevWallet::generate());
        fhe.register_wallet(&wallet);
        let revealer = Revealer::new(fhe.clone(), wallet.clone(), RevealConfig::default());
        (fhe, wallet, revealer)
    }

    #[tokio::test]
    async fn test_reveal_recovers_locator() {
        let (fhe, wallet, revealer) = setup();
        let contract = Address::generate();
        let record = sealed_record(&fhe, &wallet.wallet_address(), &contract).await;

        match revealer.reveal(&record, &contract).await {
            RevealState::Revealed { locator, .. } => assert_eq!(locator, "bafy-demo-hash"),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_revoked_handle_is_denied() {
        let (fhe, wallet, revealer) = setup();
        let contract = Address::generate();
        let record = sealed_record(&fhe, &wallet.wallet_address(), &contract).await;
        fhe.revoke(&record.identity_handle);

        let state = revealer.reveal(&record, &contract).await;
        assert_eq!(
            state,
            RevealState::Failed {
                kind: ErrorKind::AuthorizationDenied,
                reason: DockError::AuthorizationDenied.user_message(),
            }
        );
    }

    #[tokio::test]
    async fn test_unregistered_signer_is_denied() {
        let fhe = Arc::new(MockFhe::new());
        let wallet = Arc::new(DevWallet::generate());
        let revealer = Revealer::new(fhe.clone(), wallet.clone(), RevealConfig::default());
        let contract = Address::generate();
        let record = sealed_record(&fhe, &wallet.wallet_address(), &contract).await;

        assert_eq!(
            revealer.try_reveal(&record, &contract).await,
            Err(DockError::AuthorizationDenied)
        );
    }

    #[tokio::test]
    async fn test_corrupted_envelope_surfaces() {
        let (fhe, wallet, revealer) = setup();
        let contract = Address::generate();
        let mut record = sealed_record(&fhe, &wallet.wallet_address(), &contract).await;

        let mut envelope = Envelope::parse(&record.envelope).unwrap();
        envelope.ciphertext[0] ^= 0x01;
        record.envelope = envelope.to_string();
        assert_eq!(
            revealer.try_reveal(&record, &contract).await,
            Err(DockError::AuthenticationFailed)
        );

        record.envelope = "not-three-parts".into();
        assert!(matches!(
            revealer.try_reveal(&record, &contract).await,
            Err(DockError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_failed_state_is_user_safe() {
        let state = RevealState::failed(&DockError::Transport("dns lookup of relayer.internal".into()));
        match state {
            RevealState::Failed { kind, reason } => {
                assert_eq!(kind, ErrorKind::Transport);
                assert!(!reason.contains("relayer.internal"));
            }
            other => panic!("unexpected state {:?}", other),
        }
    }
}
