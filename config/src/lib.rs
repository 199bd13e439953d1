//! Privdock Configuration
//!
//! Shared configuration crate for the core and the CLI.
//!
//! Handles loading configuration from:
//! 1. PD_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.privdock/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<DockConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".privdock";

// ============================================================================
// Default Constants
// ============================================================================

/// First contract deployed by a fresh local node
const DEFAULT_CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
/// Sepolia
const DEFAULT_CHAIN_ID: u64 = 11_155_111;

const DEFAULT_ENCRYPT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REVEAL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_AUTHORIZATION_DAYS: u64 = 7;

const DEFAULT_DEV_STATE_PATH: &str = "./privdock-dev.json";

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub store: StoreTomlConfig,
    #[serde(default)]
    pub reveal: RevealTomlConfig,
    #[serde(default)]
    pub dev: DevConfig,
}

/// Ledger contract and network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_contract")]
    pub contract: String,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract: DEFAULT_CONTRACT.into(),
            rpc_url: DEFAULT_RPC_URL.into(),
            chain_id: DEFAULT_CHAIN_ID,
        }
    }
}

fn default_contract() -> String {
    DEFAULT_CONTRACT.into()
}
fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.into()
}
fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

/// Store pipeline timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreTomlConfig {
    #[serde(default = "default_encrypt_timeout")]
    pub encrypt_timeout_secs: u64,
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

impl Default for StoreTomlConfig {
    fn default() -> Self {
        Self {
            encrypt_timeout_secs: DEFAULT_ENCRYPT_TIMEOUT_SECS,
            confirm_timeout_secs: DEFAULT_CONFIRM_TIMEOUT_SECS,
        }
    }
}

fn default_encrypt_timeout() -> u64 {
    DEFAULT_ENCRYPT_TIMEOUT_SECS
}
fn default_confirm_timeout() -> u64 {
    DEFAULT_CONFIRM_TIMEOUT_SECS
}

/// Reveal pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealTomlConfig {
    /// Interactive authorization round-trip limit
    #[serde(default = "default_reveal_timeout")]
    pub timeout_secs: u64,
    /// Validity window of the signed decryption authorization
    #[serde(default = "default_authorization_days")]
    pub authorization_days: u64,
}

impl Default for RevealTomlConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_REVEAL_TIMEOUT_SECS,
            authorization_days: DEFAULT_AUTHORIZATION_DAYS,
        }
    }
}

fn default_reveal_timeout() -> u64 {
    DEFAULT_REVEAL_TIMEOUT_SECS
}
fn default_authorization_days() -> u64 {
    DEFAULT_AUTHORIZATION_DAYS
}

/// Local development backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    #[serde(default = "default_dev_state_path")]
    pub state_path: String,
    /// Owner address to query when none is given on the command line
    #[serde(default)]
    pub owner: Option<String>,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            state_path: DEFAULT_DEV_STATE_PATH.into(),
            owner: None,
        }
    }
}

fn default_dev_state_path() -> String {
    DEFAULT_DEV_STATE_PATH.into()
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(key: &str, field: &mut Option<String>) {
    if let Ok(v) = env::var(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = parsed;
        } else {
            log::warn!("Ignoring unparseable {}={}", key, v);
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl DockConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check PD_CONFIG env var
        if let Ok(path) = env::var("PD_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("PD_CONFIG points at a missing file: {}", path.display());
        }

        // 2. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.privdock/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Ledger
        env_string("PD_CONTRACT", &mut self.ledger.contract);
        env_string("PD_RPC_URL", &mut self.ledger.rpc_url);
        env_parse("PD_CHAIN_ID", &mut self.ledger.chain_id);

        // Store
        env_parse("PD_ENCRYPT_TIMEOUT_SECS", &mut self.store.encrypt_timeout_secs);
        env_parse("PD_CONFIRM_TIMEOUT_SECS", &mut self.store.confirm_timeout_secs);

        // Reveal
        env_parse("PD_REVEAL_TIMEOUT_SECS", &mut self.reveal.timeout_secs);
        env_parse("PD_AUTH_DAYS", &mut self.reveal.authorization_days);

        // Dev
        env_string("PD_DEV_STATE", &mut self.dev.state_path);
        env_option_string("PD_OWNER", &mut self.dev.owner);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static DockConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: DockConfig) -> Result<(), DockConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `DockConfig::global()`.
#[inline]
pub fn global_config() -> &'static DockConfig {
    DockConfig::global()
}

// ============================================================================
// Tests
// ============================================================================
