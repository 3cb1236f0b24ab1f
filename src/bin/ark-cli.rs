#![forbid(unsafe_code)]
//! Command-line front end for the Ark client

use ark_client::config::load_network_config;
use ark_client::ArkClient;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ark-cli", about = "Query and send transfers on an Ark network")]
struct Cli {
    /// Network file (TOML)
    #[arg(long, short, default_value = "config.toml")]
    network: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover peers and list the trusted ones
    Peers,
    /// Print the address for a passphrase
    Address {
        #[arg(long, env = "ARK_PASSPHRASE")]
        passphrase: String,
    },
    /// Show an address balance
    Balance { address: String },
    /// Sign and broadcast a transfer
    Send {
        recipient: String,
        /// Amount in the smallest unit
        amount: u64,
        #[arg(long)]
        vendor_field: Option<String>,
        #[arg(long, env = "ARK_PASSPHRASE")]
        passphrase: String,
        /// Number of trusted peers to submit to
        #[arg(long, default_value_t = 3)]
        nodes: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let params = load_network_config(&cli.network)?;
    let client = ArkClient::new(params)?;

    match cli.command {
        Command::Address { passphrase } => {
            println!("{}", client.get_address(&passphrase)?);
        }
        Command::Peers => {
            let snapshot = client.update_peers().await?;
            println!("Known peers: {}", snapshot.known.len());
            println!("Trusted peers:");
            for peer in &snapshot.trusted {
                println!(
                    "  {} (p2p {}, height {})",
                    peer,
                    peer.p2p_port,
                    peer.height.map_or_else(|| "?".to_string(), |h| h.to_string())
                );
            }
        }
        Command::Balance { address } => {
            client.update_peers().await?;
            let balance = client.get_balance(&address).await?;
            println!("{}: {}", address, balance.balance);
        }
        Command::Send {
            recipient,
            amount,
            vendor_field,
            passphrase,
            nodes,
        } => {
            client.update_peers().await?;
            let id = client
                .broadcast_transaction(&recipient, amount, vendor_field.as_deref(), &passphrase, nodes)
                .await?;
            println!("{}", id);
        }
    }
    Ok(())
}
