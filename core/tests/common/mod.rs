#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use privdock_core::{
    LedgerView, RevealConfig, Revealer, StoreConfig, StoreContext, StorePipeline, StoredFile,
};
use privdock_envelope::Address;
use privdock_ledger::{
    Attestation, AuthorizedDecryptor, DecryptionKeypair, DevWallet, EncryptedInput,
    FileSubmission, Handle, IdentityEncryptor, LedgerError, LedgerWriter, MemoryLedger, MockFhe,
    TxReceipt, UserDecryptRequest,
};

pub const CHAIN: u64 = 11_155_111;

// Helpers

/// One owner, one contract, in-memory ledger and FHE
pub struct Harness {
    pub fhe: Arc<MockFhe>,
    pub ledger: Arc<MemoryLedger>,
    pub wallet: Arc<DevWallet>,
    pub contract: Address,
}

impl Harness {
    pub fn new() -> Self {
        let fhe = Arc::new(MockFhe::new());
        let ledger = Arc::new(MemoryLedger::new(CHAIN).with_fhe(fhe.clone()));
        let wallet = Arc::new(DevWallet::generate());
        fhe.register_wallet(&wallet);
        Self {
            fhe,
            ledger,
            wallet,
            contract: Address::generate(),
        }
    }

    pub fn owner(&self) -> Address {
        self.wallet.wallet_address()
    }

    pub fn pipeline(&self) -> StorePipeline {
        StorePipeline::new(StoreConfig {
            expected_chain_id: CHAIN,
            ..StoreConfig::default()
        })
    }

    pub async fn store(&self, name: &str, locator: &str) -> StoredFile {
        let contract = self.contract.to_string();
        let ctx = StoreContext {
            owner: Some(self.owner()),
            contract: &contract,
            encryptor: self.fhe.as_ref(),
            writer: self.ledger.as_ref(),
        };
        self.pipeline()
            .store_locator(name, locator, &ctx)
            .await
            .unwrap()
    }

    pub fn revealer(&self, config: RevealConfig) -> Arc<Revealer> {
        Arc::new(Revealer::new(self.fhe.clone(), self.wallet.clone(), config))
    }

    pub fn view(&self) -> LedgerView {
        LedgerView::new(self.ledger.clone(), self.revealer(RevealConfig::default()))
    }

    pub fn view_with(
        &self,
        decryptor: Arc<dyn AuthorizedDecryptor>,
        config: RevealConfig,
    ) -> LedgerView {
        let revealer = Arc::new(Revealer::new(decryptor, self.wallet.clone(), config));
        LedgerView::new(self.ledger.clone(), revealer)
    }
}

/// Decryptor that waits before delegating
pub struct SlowDecryptor {
    pub inner: Arc<MockFhe>,
    pub delay: Duration,
}

#[async_trait]
impl AuthorizedDecryptor for SlowDecryptor {
    fn generate_keypair(&self) -> DecryptionKeypair {
        self.inner.generate_keypair()
    }

    fn build_authorization(
        &self,
        public_key: &[u8],
        contracts: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Attestation {
        self.inner
            .build_authorization(public_key, contracts, start_timestamp, duration_days)
    }

    async fn authorized_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<HashMap<Handle, String>, LedgerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.authorized_decrypt(request).await
    }
}

/// Encryptor whose round-trip never finishes in time
pub struct StalledEncryptor {
    pub delay: Duration,
}

#[async_trait]
impl IdentityEncryptor for StalledEncryptor {
    fn is_ready(&self) -> bool {
        true
    }

    async fn encrypt_identity(
        &self,
        _contract: &Address,
        _owner: &Address,
        _value: &Address,
    ) -> Result<EncryptedInput, LedgerError> {
        tokio::time::sleep(self.delay).await;
        Err(LedgerError::Transport("relayer never answered".into()))
    }
}

/// Writer whose transaction never confirms in time
pub struct StalledWriter {
    pub delay: Duration,
}

#[async_trait]
impl LedgerWriter for StalledWriter {
    fn chain_id(&self) -> u64 {
        CHAIN
    }

    async fn submit(
        &self,
        _contract: &Address,
        _submission: FileSubmission,
    ) -> Result<TxReceipt, LedgerError> {
        tokio::time::sleep(self.delay).await;
        Err(LedgerError::Unavailable("transaction dropped".into()))
    }
}
