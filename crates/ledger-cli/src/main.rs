mod client;
mod miner;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledger_core::constants::POW_DIFFICULTY;
use std::{
    path::{Path, PathBuf},
    sync::atomic::Ordering,
    time::Duration,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use client::NodeClient;
use miner::{MinerAgent, MinerConfig};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Miner and client for the minimal ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, env = "LEDGER_NODE", default_value = "http://127.0.0.1:8080")]
    node: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "LEDGER_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine blocks until interrupted
    Mine {
        /// Miner id credited with rewards
        #[arg(long, env = "LEDGER_MINER_ID")]
        id: Option<String>,
        /// File holding the miner id, used when --id is absent
        #[arg(long, default_value = "my_id.txt")]
        id_file: PathBuf,
        /// Leading hex zeros the node expects
        #[arg(long, default_value_t = POW_DIFFICULTY)]
        difficulty: u32,
        /// Search on every core (size the pool with RAYON_NUM_THREADS)
        #[arg(long)]
        parallel: bool,
        /// Stop after this many rounds
        #[arg(long)]
        max_rounds: Option<u64>,
        /// Initial pause after a failed round, in milliseconds
        #[arg(long, default_value_t = 500)]
        retry_ms: u64,
    },
    /// Submit a transaction
    Submit {
        /// Sender
        #[arg(long)]
        sender: String,
        /// Recipient
        #[arg(long)]
        recipient: String,
        /// Amount, integer or decimal
        #[arg(long)]
        amount: serde_json::Number,
    },
    /// Print the full chain
    Chain,
    /// Print the committed balance of an id
    Balance {
        #[arg(long)]
        id: String,
    },
}

fn resolve_miner_id(id: Option<String>, id_file: &Path) -> Result<String> {
    let id = match id {
        Some(id) => id,
        None => std::fs::read_to_string(id_file)
            .with_context(|| format!("reading miner id from {}", id_file.display()))?,
    };
    let id = id.trim().to_string();
    if id.is_empty() {
        bail!("miner id must not be empty");
    }
    Ok(id)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let client = NodeClient::new(&cli.node, Duration::from_secs(cli.timeout_secs))?;
    match cli.cmd {
        Command::Mine {
            id,
            id_file,
            difficulty,
            parallel,
            max_rounds,
            retry_ms,
        } => {
            let miner_id = resolve_miner_id(id, &id_file)?;
            info!("Miner ID is {miner_id}");
            let retry_delay = Duration::from_millis(retry_ms);
            let agent = MinerAgent::new(
                client,
                MinerConfig {
                    miner_id,
                    difficulty,
                    parallel,
                    retry_delay,
                    max_retry_delay: retry_delay * 16,
                    max_rounds,
                },
            );
            let stop = agent.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, stopping miner");
                    stop.store(true, Ordering::Relaxed);
                }
            });
            let report = agent.run().await;
            println!(
                "rounds: {}  coins: {}  rejected: {}  failed: {}",
                report.rounds, report.coins, report.rejections, report.failures
            );
        }
        Command::Submit {
            sender,
            recipient,
            amount,
        } => {
            let (status, message) = client.submit_transaction(&sender, &recipient, amount).await?;
            println!("status: {status}");
            println!("{message}");
        }
        Command::Chain => {
            let chain = client.chain().await?;
            println!("{}", serde_json::to_string_pretty(&chain)?);
        }
        Command::Balance { id } => {
            let balance = client.balance(&id).await?;
            println!("{}: {}", balance.id, balance.balance);
        }
    }
    Ok(())
}
