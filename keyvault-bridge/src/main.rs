//! Keyvault command line

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use keyvault_bridge::{in_memory_manager, logging, BridgeConfig};
use keyvault_core::chains::plugin_for;
use keyvault_core::crypto::cipher::Password;
use keyvault_core::crypto::mnemonic::{generate_mnemonic, MnemonicStrength};
use keyvault_core::dapp::{ApprovalPrompt, ApprovalResponse, ApprovalUi};
use keyvault_core::network::parse_network_impl;
use keyvault_core::transaction::OfflineChainClient;

#[derive(Parser)]
#[command(name = "keyvault")]
#[command(about = "Multi-chain keyvault tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive HD accounts from a mnemonic
    Derive {
        /// Network id, e.g. evm--1, sol--101, algo--4160
        #[arg(short, long, default_value = "evm--1")]
        network: String,
        /// Mnemonic phrase; read from KEYVAULT_MNEMONIC when omitted
        #[arg(short, long, env = "KEYVAULT_MNEMONIC", hide_env_values = true)]
        mnemonic: String,
        /// First account index
        #[arg(long, default_value_t = 0)]
        start: u32,
        /// Number of accounts
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
    /// Check an address and print its normalised form
    ValidateAddress {
        #[arg(short, long, default_value = "evm--1")]
        network: String,
        address: String,
    },
    /// Generate a new mnemonic phrase
    GenerateMnemonic {
        /// 12 or 24
        #[arg(short, long, default_value_t = 12)]
        words: u32,
    },
}

/// The CLI never has a user to ask
struct RejectAll;

#[async_trait]
impl ApprovalUi for RejectAll {
    async fn request_approval(&self, _prompt: ApprovalPrompt) -> ApprovalResponse {
        ApprovalResponse::Rejected
    }

    async fn show_network_mismatch(&self, _prompt: ApprovalPrompt) {}
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = BridgeConfig::from_env();
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Derive {
            network,
            mnemonic,
            start,
            count,
        } => derive(&config, &network, &mnemonic, start, count).await,
        Commands::ValidateAddress { network, address } => {
            let plugin = plugin_for(parse_network_impl(&network)?);
            let normalised = plugin
                .validate_address(&address)
                .with_context(|| format!("{} is not a valid {} address", address, plugin.chain_impl()))?;
            println!("{}", normalised);
            Ok(())
        }
        Commands::GenerateMnemonic { words } => {
            let strength = match words {
                12 => MnemonicStrength::Words12,
                24 => MnemonicStrength::Words24,
                other => bail!("Unsupported word count: {}", other),
            };
            let mnemonic = generate_mnemonic(strength)?;
            println!("{}", mnemonic.as_str());
            Ok(())
        }
    }
}

async fn derive(config: &BridgeConfig, network: &str, mnemonic: &str, start: u32, count: u32) -> Result<()> {
    if count == 0 {
        bail!("Count must be at least 1");
    }
    let indexes: Vec<u32> = (start..start.saturating_add(count)).collect();

    let manager = in_memory_manager(config, Arc::new(RejectAll), Arc::new(OfflineChainClient::new()))?;
    // Throwaway wallet; the password never leaves this process
    let password = Password::new(uuid::Uuid::new_v4().to_string());
    let wallet = manager
        .create_hd_wallet("cli", mnemonic, &password)
        .await
        .context("Invalid mnemonic")?;
    let accounts = manager
        .add_hd_accounts(network, &wallet.id, &password, indexes)
        .await?;

    info!(network, count = accounts.len(), "accounts derived");
    println!("{}", serde_json::to_string_pretty(&accounts)?);
    Ok(())
}
