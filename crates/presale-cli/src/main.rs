//! `presale`: inspect and prepare presale purchases from the command line.
//!
//! No keys are involved. `build` prints an unsigned transaction for an
//! external wallet to sign.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use presale_core::{Address, JsonRpcClient, Presale, PresaleConfig, RpcConnection, TransactionId};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Presale purchase tooling", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file; defaults to the deployed presale
    #[arg(short, long, env = "PRESALE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate an amount and show it in lamports
    Quote {
        /// Amount in SOL, e.g. 0.05
        amount: String,
    },

    /// Show the accounts a purchase by OWNER would touch
    Addresses {
        #[arg(long)]
        owner: String,
    },

    /// Build an unsigned purchase transaction with a fresh blockhash
    Build {
        #[arg(long)]
        owner: String,

        /// Amount in SOL
        #[arg(long)]
        amount: String,
    },

    /// Look up the status of a submitted transaction
    Status {
        /// Base58 transaction signature
        signature: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "presale=debug,presale_core=debug"
    } else {
        "presale=info,presale_core=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn connect(config: &PresaleConfig) -> Result<JsonRpcClient> {
    JsonRpcClient::new(&config.network.rpc_url, config.network.rpc_timeout())
        .with_context(|| format!("connecting to {}", config.network.rpc_url))
}

fn parse_owner(owner: &str) -> Result<Address> {
    owner.parse().with_context(|| format!("invalid owner address {owner:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = PresaleConfig::load(args.config.as_deref()).context("loading configuration")?;
    debug!(rpc_url = %config.network.rpc_url, "configuration loaded");
    let presale = Presale::new(config)?;

    match args.command {
        Commands::Quote { amount } => {
            let lamports = presale.quote(&amount)?;
            println!("{lamports} SOL = {} lamports", lamports.get());
        }

        Commands::Addresses { owner } => {
            let owner = parse_owner(&owner)?;
            let derived = presale.derive_addresses(&owner)?;
            let config = presale.config();
            println!("program:          {}", config.program_id);
            println!("sol receiver:     {}", config.sol_receiver);
            println!("mint:             {}", config.mint);
            println!("mint authority:   {}", derived.authority);
            println!("owner:            {owner}");
            println!("owner token acct: {}", derived.holding);
        }

        Commands::Build { owner, amount } => {
            let owner = parse_owner(&owner)?;
            let client = connect(presale.config())?;
            info!(rpc_url = client.url(), "fetching recent blockhash");
            let envelope = presale.prepare(&client, &owner, &amount).await?;

            println!("blockhash:              {}", chain_sol::bytes_to_address(&envelope.recent_blockhash()));
            println!("last valid block height: {}", envelope.last_valid_block_height);
            println!("{}", envelope.to_base64());
        }

        Commands::Status { signature } => {
            chain_sol::signature_from_str(&signature)
                .with_context(|| format!("invalid signature {signature:?}"))?;
            let client = connect(presale.config())?;
            let id = TransactionId::from(signature);

            match client.signature_status(&id).await? {
                None => println!("{id}: not found"),
                Some(status) => {
                    let level = status
                        .confirmation
                        .map_or_else(|| "seen".to_string(), |c| c.to_string());
                    match status.err {
                        Some(err) => println!("{id}: failed at slot {} ({err})", status.slot),
                        None => println!("{id}: {level} at slot {}", status.slot),
                    }
                }
            }
        }
    }

    Ok(())
}
