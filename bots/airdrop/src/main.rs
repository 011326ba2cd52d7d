mod chain;
mod config;
mod workflow;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use core_logic::{setup_logger, KeyStore};
use dotenv::dotenv;
use ethers::prelude::*;
use std::sync::Arc;
use tracing::info;

use crate::chain::{Chain, EvmChain};
use crate::config::BotConfig;
use crate::workflow::{DistributeWorkflow, GenerateWorkflow, StakeWorkflow};

#[derive(Parser, Debug)]
#[command(author, version, about = "Wallet generation, token distribution and staking bot", long_about = None)]
#[command(group(ArgGroup::new("mode").args(["generate", "clean", "export", "transfer", "staking"])))]
struct Args {
    /// Generate `account_count` wallets
    #[arg(short = 'G', long)]
    generate: bool,
    /// Drop every persisted wallet
    #[arg(short = 'C', long)]
    clean: bool,
    /// Export all wallets as JSON to the given file
    #[arg(short = 'E', long, value_name = "PATH")]
    export: Option<String>,
    /// Run the distribution workflow once to completion
    #[arg(short = 'T', long)]
    transfer: bool,
    /// Run the staking workflow until no eligible wallet remains
    #[arg(short = 'S', long)]
    staking: bool,
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,
    /// Verbose logging
    #[arg(short = 'D', long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_guard = setup_logger(args.debug);
    // Keep guard alive for file logging
    std::mem::forget(log_guard);
    dotenv().ok();

    info!("Loading config from: {}", args.config);
    let config = BotConfig::load(&args.config)?;
    info!("Configuration loaded for chain ID: {}", config.chain_id);

    let store = KeyStore::open(&config.database.path).await?;

    if args.generate {
        let created = GenerateWorkflow::new(store, config.account_count)
            .run()
            .await?;
        info!("Created {} wallets.", created);
        return Ok(());
    }
    if args.clean {
        let removed = store.drop_all().await?;
        info!("Removed {} wallets.", removed);
        return Ok(());
    }
    if let Some(path) = args.export.as_deref() {
        let exported = store.export_all(path).await?;
        info!("Exported {} wallets to {}", exported, path);
        return Ok(());
    }

    let chain: Arc<dyn Chain> = Arc::new(EvmChain::new(
        &config.chain_rpc,
        config.chain_id,
        config.multi_send_address()?,
        config.staking_contract()?,
    )?);
    let funding: LocalWallet = config.main_account_key.parse()?;

    if args.transfer {
        DistributeWorkflow::new(chain, store, config, funding)
            .run()
            .await?;
    } else if args.staking {
        StakeWorkflow::new(chain, store, config).run().await?;
    } else {
        // Default long-lived mode: one full distribution pass, then stake
        // until no eligible wallet remains.
        DistributeWorkflow::new(Arc::clone(&chain), store.clone(), config.clone(), funding)
            .run()
            .await?;
        StakeWorkflow::new(chain, store, config).run().await?;
    }

    Ok(())
}
