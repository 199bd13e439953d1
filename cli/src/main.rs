//! # privdock
//!
//! Operator CLI over the local development backends.
//!
//! ```text
//!   privdock store --name report.pdf        seal + store a (mock) locator
//!   privdock list                           the wallet's ledger entries
//!   privdock get --index 0                  one raw ledger entry
//!   privdock reveal [--index 0]             recover locators
//! ```

mod dev;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use privdock_config::{DockConfig, global_config};
use privdock_core::{
    LedgerView, RevealConfig, RevealState, Revealer, StoreConfig, StoreContext, StorePipeline,
};
use privdock_envelope::Address;
use privdock_ledger::LedgerReader;
use tracing::{info, warn};

use crate::dev::DevBackends;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "privdock")]
#[command(about = "Encrypted file ledger - seal locators under one-time addresses", long_about = None)]
struct Cli {
    /// Config file (defaults to PD_CONFIG, ./config.toml, ~/.privdock/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dev state file (overrides dev.state_path)
    #[arg(long, global = true, env = "PD_DEV_STATE")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the ledger contract and the dev wallet
    Address,

    /// Seal a locator and store it on the ledger
    Store {
        /// File name recorded next to the envelope
        #[arg(long)]
        name: String,

        /// Content locator; a mock one is generated when omitted
        #[arg(long)]
        locator: Option<String>,

        /// Also print the one-time address (it opens the envelope)
        #[arg(long)]
        show_secret: bool,
    },

    /// List an owner's entries
    List {
        #[arg(long)]
        owner: Option<String>,
    },

    /// Print one raw ledger entry
    Get {
        #[arg(long)]
        owner: Option<String>,

        #[arg(long)]
        index: u64,
    },

    /// Reveal one entry, or all of them
    Reveal {
        #[arg(long)]
        index: Option<usize>,
    },

    /// Print a sample configuration file
    InitConfig,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::InitConfig = cli.command {
        print!("{}", DockConfig::generate_sample());
        return Ok(());
    }

    let loaded = match &cli.config {
        Some(path) => DockConfig::load_from(path)?,
        None => DockConfig::load()?,
    };
    if DockConfig::set_global(loaded).is_err() {
        warn!("Config was already initialized, keeping the existing one");
    }
    let config = global_config();
    let state_path = cli
        .state
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.dev.state_path));
    let backends = DevBackends::open(&state_path, config.ledger.chain_id)?;

    match cli.command {
        Command::Address => address(config, &backends),
        Command::Store {
            name,
            locator,
            show_secret,
        } => store(config, &backends, name, locator, show_secret).await,
        Command::List { owner } => list(config, &backends, owner).await,
        Command::Get { owner, index } => get(config, &backends, owner, index).await,
        Command::Reveal { index } => reveal(config, &backends, index).await,
        Command::InitConfig => Ok(()),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn address(config: &DockConfig, backends: &DevBackends) -> Result<()> {
    println!("Contract:  {}", contract(config)?);
    println!("Chain id:  {}", config.ledger.chain_id);
    println!("RPC:       {}", config.ledger.rpc_url);
    println!("Wallet:    {}", backends.wallet.wallet_address());
    println!("Dev state: {}", backends.path().display());
    Ok(())
}

async fn store(
    config: &DockConfig,
    backends: &DevBackends,
    name: String,
    locator: Option<String>,
    show_secret: bool,
) -> Result<()> {
    let mut pipeline = StorePipeline::new(StoreConfig::from_config(config));
    pipeline.select(name);
    match locator {
        Some(locator) => pipeline.set_locator(&locator)?,
        None => {
            let locator = pipeline.hash()?;
            println!("📦 Mock locator: {}", locator);
        }
    }

    let ctx = StoreContext {
        owner: Some(backends.wallet.wallet_address()),
        contract: &config.ledger.contract,
        encryptor: backends.fhe.as_ref(),
        writer: backends.ledger.as_ref(),
    };
    let stored = match pipeline.store(&ctx).await {
        Ok(stored) => stored,
        Err(e) => {
            let shown = pipeline
                .last_error()
                .map(str::to_string)
                .unwrap_or_else(|| e.user_message());
            return Err(anyhow!("{} ({})", shown, e));
        }
    };
    backends.save()?;

    println!("✅ {}", pipeline.status());
    for line in output::stored_summary(&stored, show_secret) {
        println!("{}", line);
    }

    // Refresh so the new entry shows up with its ledger index
    let view = ledger_view(config, backends);
    let owner = backends.wallet.wallet_address();
    view.load(owner, contract(config)?).await?;
    let entries = view.entries().await;
    if let Some(entry) = entries.last() {
        println!();
        output::print_entries(std::slice::from_ref(entry));
    }
    info!("Ledger now holds {} entries for {}", entries.len(), owner);
    Ok(())
}

async fn list(config: &DockConfig, backends: &DevBackends, owner: Option<String>) -> Result<()> {
    let owner = resolve_owner(config, backends, owner)?;
    let view = ledger_view(config, backends);
    view.load(owner, contract(config)?).await?;

    if view.is_empty().await {
        println!("No files stored by {} yet.", owner);
        return Ok(());
    }
    output::print_entries(&view.entries().await);
    Ok(())
}

async fn get(
    config: &DockConfig,
    backends: &DevBackends,
    owner: Option<String>,
    index: u64,
) -> Result<()> {
    let owner = resolve_owner(config, backends, owner)?;
    let contract = contract(config)?;

    let count = backends.ledger.count(&contract, &owner).await?;
    println!("Files stored by {}: {}", owner, count);

    let record = backends
        .ledger
        .get(&contract, &owner, index)
        .await
        .with_context(|| format!("No entry {} for {}", index, owner))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    println!("Stored at: {}", output::format_timestamp(record.timestamp));
    Ok(())
}

async fn reveal(config: &DockConfig, backends: &DevBackends, index: Option<usize>) -> Result<()> {
    let view = ledger_view(config, backends);
    view.load(backends.wallet.wallet_address(), contract(config)?)
        .await?;

    let indices: Vec<usize> = match index {
        Some(index) => {
            view.reveal(index).await?;
            vec![index]
        }
        None => view
            .reveal_all()
            .await
            .into_iter()
            .map(|(index, _)| index)
            .collect(),
    };

    if indices.is_empty() {
        println!("Nothing to reveal.");
        return Ok(());
    }

    for index in indices {
        let state = view.wait(index).await?;
        let entry = view.get(index).await?;
        match state {
            RevealState::Revealed { identity, locator } => {
                println!("🔓 [{}] {}", index, entry.record.name);
                println!("     Address:  {}", identity);
                println!("     Locator:  {}", locator);
            }
            RevealState::Failed { reason, .. } => {
                println!("🔒 [{}] {}: {}", index, entry.record.name, reason);
            }
            other => println!("   [{}] {}: {:?}", index, entry.record.name, other),
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn contract(config: &DockConfig) -> Result<Address> {
    Address::parse(&config.ledger.contract)
        .with_context(|| format!("Invalid contract address: {}", config.ledger.contract))
}

fn resolve_owner(
    config: &DockConfig,
    backends: &DevBackends,
    owner: Option<String>,
) -> Result<Address> {
    match owner.or_else(|| config.dev.owner.clone()) {
        Some(owner) => {
            Address::parse(&owner).with_context(|| format!("Invalid owner address: {}", owner))
        }
        None => Ok(backends.wallet.wallet_address()),
    }
}

fn ledger_view(config: &DockConfig, backends: &DevBackends) -> LedgerView {
    let revealer = Revealer::new(
        backends.fhe.clone(),
        backends.wallet.clone(),
        RevealConfig::from_config(config),
    );
    LedgerView::new(backends.ledger.clone(), Arc::new(revealer))
}
