//! Local development backends
//!
//! The in-memory ledger, FHE service and wallet, persisted as one JSON
//! file between CLI invocations.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use privdock_ledger::{DevWallet, FheSnapshot, LedgerSnapshot, MemoryLedger, MockFhe};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// On-disk layout of the dev state file
#[derive(Debug, Serialize, Deserialize)]
struct DevState {
    ledger: LedgerSnapshot,
    fhe: FheSnapshot,
    #[serde(with = "hex")]
    wallet_secret: [u8; 32],
}

pub struct DevBackends {
    pub ledger: Arc<MemoryLedger>,
    pub fhe: Arc<MockFhe>,
    pub wallet: Arc<DevWallet>,
    path: PathBuf,
}

impl DevBackends {
    /// Restore the backends from `path`, or start fresh ones on `chain_id`
    /// if the file does not exist yet.
    pub fn open(path: &Path, chain_id: u64) -> Result<Self> {
        if !path.exists() {
            info!("No dev state at {}, starting a new one", path.display());
            let fhe = Arc::new(MockFhe::new());
            let wallet = Arc::new(DevWallet::generate());
            fhe.register_wallet(&wallet);
            let ledger = Arc::new(MemoryLedger::new(chain_id).with_fhe(fhe.clone()));

            let backends = Self {
                ledger,
                fhe,
                wallet,
                path: path.to_path_buf(),
            };
            backends.save()?;
            return Ok(backends);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read dev state: {}", path.display()))?;
        let state: DevState = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse dev state: {}", path.display()))?;

        let fhe = Arc::new(MockFhe::from_snapshot(state.fhe));
        let wallet = Arc::new(DevWallet::from_secret(state.wallet_secret));
        fhe.register_wallet(&wallet);
        let ledger = Arc::new(MemoryLedger::from_snapshot(state.ledger).with_fhe(fhe.clone()));
        debug!(
            "Restored dev state: {} record(s), {} handle(s)",
            ledger.total_records(),
            fhe.handle_count()
        );

        Ok(Self {
            ledger,
            fhe,
            wallet,
            path: path.to_path_buf(),
        })
    }

    /// Write the current state back to disk (owner-only permissions, the
    /// file holds the wallet secret)
    pub fn save(&self) -> Result<()> {
        let state = DevState {
            ledger: self.ledger.snapshot(),
            fhe: self.fhe.snapshot(),
            wallet_secret: self.wallet.secret_bytes(),
        };
        let json = serde_json::to_string_pretty(&state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write dev state: {}", self.path.display()))?;

        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use privdock_envelope::Address;
    use privdock_ledger::{IdentityEncryptor, LedgerReader};

    #[test]
    fn fresh_state_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dev.json");

        let backends = DevBackends::open(&path, 11_155_111).unwrap();
        assert!(path.exists());
        assert_eq!(backends.ledger.total_records(), 0);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.json");
        let contract = Address::generate();

        let first = DevBackends::open(&path, 11_155_111).unwrap();
        let owner = first.wallet.wallet_address();
        let input = first
            .fhe
            .encrypt_identity(&contract, &owner, &Address::generate())
            .await
            .unwrap();
        first.save().unwrap();

        let second = DevBackends::open(&path, 1).unwrap();
        assert_eq!(second.wallet.wallet_address(), owner);
        assert!(second.fhe.verify_input(&contract, &owner, &input.handle, &input.proof));
        // Chain id comes from the file, not the argument
        assert_eq!(
            privdock_ledger::LedgerWriter::chain_id(second.ledger.as_ref()),
            11_155_111
        );
        assert_eq!(second.ledger.count(&contract, &owner).await.unwrap(), 0);
    }
}
