//! Store Pipeline
//!
//! Seals a locator under a fresh one-time address and writes it to the
//! ledger together with the FHE-encrypted address.
//!
//! ```text
//!  Idle ──▶ Hashing ──▶ Ready ──▶ Encrypting ──▶ Confirming ──▶ Complete
//!                         ▲            │              │
//!                         └── failure ─┴──────────────┘
//! ```
//!
//! A failed attempt drops back to `Ready` with the draft intact, so the
//! same locator can be submitted again without hashing again.

use std::future::Future;
use std::time::Duration;

use privdock_config::DockConfig;
use privdock_envelope::{Address, generate_locator};
use privdock_ledger::{
    EncryptedInput, FileSubmission, Handle, IdentityEncryptor, LedgerError, LedgerWriter,
    TxReceipt,
};
use tracing::{debug, info, warn};

use crate::error::DockError;

/// Shown after any failed submission attempt
pub const STORE_FAILED: &str = "Failed to store file metadata. Please retry.";

// Configuration

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Chain the ledger contract lives on
    pub expected_chain_id: u64,
    /// Limit on the FHE input encryption round-trip
    pub encrypt_timeout: Duration,
    /// Limit on sending `storeFile` and waiting for its confirmation
    pub confirm_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_config(&DockConfig::default())
    }
}

impl StoreConfig {
    pub fn from_config(config: &DockConfig) -> Self {
        Self {
            expected_chain_id: config.ledger.chain_id,
            encrypt_timeout: Duration::from_secs(config.store.encrypt_timeout_secs),
            confirm_timeout: Duration::from_secs(config.store.confirm_timeout_secs),
        }
    }
}

// State

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreStage {
    /// File picked (or nothing yet), no locator
    #[default]
    Idle,
    Hashing,
    /// Locator available, can be stored
    Ready,
    /// Sealing the locator and FHE-encrypting the one-time address
    Encrypting,
    /// `storeFile` sent, waiting for confirmation
    Confirming,
    Complete,
}

impl StoreStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreStage::Idle => "idle",
            StoreStage::Hashing => "hashing",
            StoreStage::Ready => "ready",
            StoreStage::Encrypting => "encrypting",
            StoreStage::Confirming => "confirming",
            StoreStage::Complete => "complete",
        }
    }
}

impl std::fmt::Display for StoreStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything `store` needs from the caller's session
pub struct StoreContext<'a> {
    /// Connected wallet, if any
    pub owner: Option<Address>,
    /// Ledger contract, as entered
    pub contract: &'a str,
    pub encryptor: &'a dyn IdentityEncryptor,
    pub writer: &'a dyn LedgerWriter,
}

/// Result of a confirmed submission
#[derive(Clone)]
pub struct StoredFile {
    pub name: String,
    /// Serialized envelope as written to the ledger
    pub envelope: String,
    pub identity_handle: Handle,
    pub receipt: TxReceipt,
    /// One-time address that seals the envelope
    pub ephemeral: Address,
}

impl std::fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredFile")
            .field("name", &self.name)
            .field("identity_handle", &self.identity_handle)
            .field("tx_hash", &self.receipt.hash_hex())
            .finish_non_exhaustive() // Hides the one-time address
    }
}

#[derive(Debug, Clone)]
struct Draft {
    name: String,
    locator: Option<String>,
}

// Pipeline

#[derive(Debug)]
pub struct StorePipeline {
    config: StoreConfig,
    draft: Option<Draft>,
    stage: StoreStage,
    status: String,
    last_error: Option<String>,
}

impl StorePipeline {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            draft: None,
            stage: StoreStage::Idle,
            status: String::new(),
            last_error: None,
        }
    }

    pub fn stage(&self) -> StoreStage {
        self.stage
    }

    /// Human readable progress line
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn locator(&self) -> Option<&str> {
        self.draft.as_ref().and_then(|d| d.locator.as_deref())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.draft.as_ref().map(|d| d.name.as_str())
    }

    /// Pick a new file. Discards any previous draft.
    pub fn select(&mut self, name: impl Into<String>) {
        self.draft = Some(Draft {
            name: name.into(),
            locator: None,
        });
        self.enter(StoreStage::Idle, "");
        self.last_error = None;
    }

    /// Produce a content locator for the selected file.
    pub fn hash(&mut self) -> Result<&str, DockError> {
        if self.draft.is_none() {
            return Err(self.reject("Choose a file first."));
        }

        self.enter(StoreStage::Hashing, "Hashing the content locally...");
        self.last_error = None;
        let locator = generate_locator();
        self.enter(StoreStage::Ready, "Content locator generated.");

        let draft = self
            .draft
            .as_mut()
            .ok_or_else(|| DockError::precondition("Choose a file first."))?;
        Ok(draft.locator.insert(locator).as_str())
    }

    /// Use a locator computed elsewhere.
    pub fn set_locator(&mut self, locator: &str) -> Result<(), DockError> {
        if self.draft.is_none() {
            return Err(self.reject("Choose a file first."));
        }
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(self.reject("The content locator is empty."));
        }

        if let Some(draft) = self.draft.as_mut() {
            draft.locator = Some(locator.to_string());
        }
        self.enter(StoreStage::Ready, "Content locator set.");
        self.last_error = None;
        Ok(())
    }

    /// Forget the draft
    pub fn reset(&mut self) {
        self.draft = None;
        self.enter(StoreStage::Idle, "");
        self.last_error = None;
    }

    /// `select` + `set_locator` + `store` in one call
    pub async fn store_locator(
        &mut self,
        name: &str,
        locator: &str,
        ctx: &StoreContext<'_>,
    ) -> Result<StoredFile, DockError> {
        self.select(name);
        self.set_locator(locator)?;
        self.store(ctx).await
    }

    /// Seal the drafted locator and write it to the ledger.
    ///
    /// Preconditions are checked before any cryptographic or network work;
    /// a violation leaves the stage where it was. Any later failure returns
    /// the pipeline to `Ready`.
    pub async fn store(&mut self, ctx: &StoreContext<'_>) -> Result<StoredFile, DockError> {
        let (name, locator, owner, contract) = self.check_preconditions(ctx)?;

        self.last_error = None;
        match self.submit(ctx, name, &locator, owner, contract).await {
            Ok(stored) => {
                info!(
                    "Stored '{}' in tx {} (block {})",
                    stored.name,
                    stored.receipt.hash_hex(),
                    stored.receipt.block_number
                );
                self.enter(StoreStage::Complete, "Stored on-chain.");
                Ok(stored)
            }
            Err(e) => {
                warn!("Store attempt failed: {}", e);
                self.enter(StoreStage::Ready, "");
                self.last_error = Some(STORE_FAILED.to_string());
                Err(e)
            }
        }
    }

    fn check_preconditions(
        &mut self,
        ctx: &StoreContext<'_>,
    ) -> Result<(String, String, Address, Address), DockError> {
        let Some(draft) = self.draft.clone() else {
            return Err(self.reject("Choose a file first."));
        };
        let Some(locator) = draft.locator.filter(|l| !l.is_empty()) else {
            return Err(self.reject("Generate the content locator first."));
        };
        let Some(owner) = ctx.owner else {
            return Err(self.reject("Connect your wallet first."));
        };
        let Ok(contract) = Address::parse(ctx.contract) else {
            return Err(self.reject("Enter a valid contract address."));
        };
        if !ctx.encryptor.is_ready() {
            return Err(self.reject("The encryption service is still loading."));
        }
        let chain_id = ctx.writer.chain_id();
        if chain_id != self.config.expected_chain_id {
            return Err(self.reject(format!(
                "Switch your wallet to chain {} before storing (currently on {}).",
                self.config.expected_chain_id, chain_id
            )));
        }

        Ok((draft.name, locator, owner, contract))
    }

    async fn submit(
        &mut self,
        ctx: &StoreContext<'_>,
        name: String,
        locator: &str,
        owner: Address,
        contract: Address,
    ) -> Result<StoredFile, DockError> {
        self.enter(
            StoreStage::Encrypting,
            "Sealing the locator with a fresh one-time address...",
        );
        let ephemeral = Address::generate();
        let envelope = privdock_envelope::encrypt(locator, &ephemeral.to_string())?.to_string();

        self.status = "Encrypting the one-time address with FHE...".into();
        let EncryptedInput { handle, proof } = bounded(
            "identity encryption",
            self.config.encrypt_timeout,
            ctx.encryptor.encrypt_identity(&contract, &owner, &ephemeral),
        )
        .await?;
        debug!("Identity handle {} ({} byte proof)", handle.short(), proof.as_bytes().len());

        self.enter(
            StoreStage::Confirming,
            "Submitting encrypted metadata to the ledger...",
        );
        let submission = FileSubmission {
            sender: owner,
            name: name.clone(),
            envelope: envelope.clone(),
            identity_handle: handle.clone(),
            proof,
        };
        let receipt = bounded(
            "ledger confirmation",
            self.config.confirm_timeout,
            ctx.writer.submit(&contract, submission),
        )
        .await?;

        Ok(StoredFile {
            name,
            envelope,
            identity_handle: handle,
            receipt,
            ephemeral,
        })
    }

    fn enter(&mut self, stage: StoreStage, status: &str) {
        if self.stage != stage {
            info!("Store stage: {} -> {}", self.stage, stage);
        }
        self.stage = stage;
        self.status = status.to_string();
    }

    fn reject(&mut self, reason: impl Into<String>) -> DockError {
        let reason = reason.into();
        self.last_error = Some(reason.clone());
        DockError::PreconditionFailed(reason)
    }
}

/// Run an external round-trip under a deadline
async fn bounded<T>(
    stage: &'static str,
    after: Duration,
    fut: impl Future<Output = Result<T, LedgerError>>,
) -> Result<T, DockError> {
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(|e| {
            debug!("{} failed: {}", stage, e);
            DockError::from(e)
        }),
        Err(_) => Err(DockError::Timeout { stage, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use privdock_envelope::LOCATOR_PREFIX;
    use privdock_ledger::{LedgerReader, MemoryLedger, MockFhe};

    const CHAIN: u64 = 11_155_111;

    fn pipeline() -> StorePipeline {
        StorePipeline::new(StoreConfig {
            expected_chain_id: CHAIN,
            ..StoreConfig::default()
        })
    }

    #[test]
    fn test_draft_lifecycle() {
        let mut pipeline = pipeline();
        assert!(pipeline.hash().is_err());
        assert_eq!(pipeline.last_error(), Some("Choose a file first."));

        pipeline.select("report.pdf");
        assert_eq!(pipeline.stage(), StoreStage::Idle);
        assert!(pipeline.last_error().is_none());

        let locator = pipeline.hash().unwrap().to_string();
        assert!(locator.starts_with(LOCATOR_PREFIX));
        assert_eq!(pipeline.stage(), StoreStage::Ready);
        assert_eq!(pipeline.locator(), Some(locator.as_str()));

        pipeline.select("other.txt");
        assert_eq!(pipeline.stage(), StoreStage::Idle);
        assert!(pipeline.locator().is_none());

        pipeline.reset();
        assert!(pipeline.file_name().is_none());
    }

    #[test]
    fn test_blank_locator_rejected() {
        let mut pipeline = pipeline();
        pipeline.select("a.txt");
        assert!(matches!(
            pipeline.set_locator("   "),
            Err(DockError::PreconditionFailed(_))
        ));
        assert_eq!(pipeline.stage(), StoreStage::Idle);
    }

    #[tokio::test]
    async fn test_store_completes() {
        let fhe = Arc::new(MockFhe::new());
        let ledger = MemoryLedger::new(CHAIN).with_fhe(fhe.clone());
        let owner = Address::generate();
        let contract = Address::generate().to_string();

        let mut pipeline = pipeline();
        pipeline.select("notes.md");
        pipeline.set_locator("bafy-demo-hash").unwrap();

        let ctx = StoreContext {
            owner: Some(owner),
            contract: &contract,
            encryptor: fhe.as_ref(),
            writer: &ledger,
        };
        let stored = pipeline.store(&ctx).await.unwrap();

        assert_eq!(pipeline.stage(), StoreStage::Complete);
        assert_eq!(stored.name, "notes.md");
        assert_eq!(
            privdock_envelope::decrypt_payload(&stored.envelope, &stored.ephemeral.to_string())
                .unwrap(),
            "bafy-demo-hash"
        );

        let contract = Address::parse(&contract).unwrap();
        assert_eq!(ledger.count(&contract, &owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_debug_hides_ephemeral() {
        let fhe = MockFhe::new();
        let ledger = MemoryLedger::new(CHAIN);
        let contract = Address::generate().to_string();

        let mut pipeline = pipeline();
        let ctx = StoreContext {
            owner: Some(Address::generate()),
            contract: &contract,
            encryptor: &fhe,
            writer: &ledger,
        };
        let stored = pipeline
            .store_locator("a.bin", "bafyabc", &ctx)
            .await
            .unwrap();

        let rendered = format!("{:?}", stored);
        assert!(!rendered.contains(&stored.ephemeral.to_string()));
    }
}
