//! Ledger record model
//!
//! A stored file is the 4-tuple `(name, envelope, identity handle,
//! timestamp)`. Records are immutable once written.

use std::fmt;
use std::str::FromStr;

use privdock_envelope::Address;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

/// Byte strings that travel as `0x`-prefixed hex
macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub Vec<u8>);

        impl $name {
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Short form for listings: `0x1234abcd…`
            pub fn short(&self) -> String {
                let full = self.to_string();
                match full.char_indices().nth(18) {
                    Some((cut, _)) => format!("{}…", &full[..cut]),
                    None => full,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.trim().strip_prefix("0x").unwrap_or(s.trim());
                hex::decode(digits).map(Self).map_err(|_| {
                    LedgerError::Rejected(format!("invalid {} hex", stringify!($name)))
                })
            }
        }

        impl TryFrom<String> for $name {
            type Error = LedgerError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

hex_bytes!(
    /// Opaque FHE ciphertext handle for an encrypted address
    Handle
);
hex_bytes!(
    /// Proof that accompanies an external encrypted input
    InputProof
);
hex_bytes!(
    /// Wallet signature over an attestation digest
    Signature
);

/// A record as read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Original file name
    pub name: String,
    /// Serialized envelope, `iv:tag:ciphertext`
    pub envelope: String,
    /// FHE handle of the one-time address
    pub identity_handle: Handle,
    /// Block timestamp, seconds
    pub timestamp: u64,
}

/// Arguments of a `storeFile` transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSubmission {
    /// Transaction sender; records are indexed under this owner
    pub sender: Address,
    pub name: String,
    pub envelope: String,
    pub identity_handle: Handle,
    pub proof: InputProof,
}

/// Confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    #[serde(with = "hex")]
    pub tx_hash: [u8; 32],
    pub block_number: u64,
}

impl TxReceipt {
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.tx_hash))
    }
}

/// Typed data a user signs to authorize decryption of their handles.
///
/// Binds a one-time decryption public key to a set of contracts and a
/// validity window of whole days starting at `start_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    #[serde(with = "hex")]
    pub public_key: Vec<u8>,
    pub contract_addresses: Vec<Address>,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl Attestation {
    const DOMAIN: &'static [u8] = b"privdock:UserDecryptRequestVerification:v1";
    pub const SECONDS_PER_DAY: u64 = 86_400;

    /// Digest that wallets sign
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(Self::DOMAIN);
        hasher.update((self.public_key.len() as u64).to_be_bytes());
        hasher.update(&self.public_key);
        hasher.update((self.contract_addresses.len() as u64).to_be_bytes());
        for contract in &self.contract_addresses {
            hasher.update(contract.as_bytes());
        }
        hasher.update(self.start_timestamp.to_be_bytes());
        hasher.update(self.duration_days.to_be_bytes());
        hasher.finalize().into()
    }

    /// End of the validity window (exclusive)
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(Self::SECONDS_PER_DAY))
    }

    pub fn is_live_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now < self.expires_at()
    }

    pub fn covers(&self, contract: &Address) -> bool {
        self.contract_addresses.contains(contract)
    }
}
