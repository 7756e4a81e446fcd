use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "powledger-cli")]
#[command(about = "CLI client for a powledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction to the pending pool
    Submit {
        /// Sender
        #[arg(long)]
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Amount
        #[arg(long)]
        amount: u64,
        /// Optional signature, hex encoded
        #[arg(long)]
        signature: Option<String>,
    },
    /// Mine the pending pool into a new block
    Mine,
    /// Register one or more peers with the node
    Register {
        /// Peer address (repeatable)
        #[arg(long = "peer", required = true)]
        peers: Vec<String>,
    },
    /// Ask the node to resolve conflicts against its peers
    Resolve,
    /// Print the node's full chain snapshot
    Chain,
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();

    let request = match cli.cmd {
        Command::Submit {
            from,
            to,
            amount,
            signature,
        } => {
            let tx = Tx {
                sender: from,
                recipient: to,
                amount,
                signature,
            };
            client.post(format!("{node}/transaction")).json(&tx)
        }
        Command::Mine => client.post(format!("{node}/mine")),
        Command::Register { peers } => client
            .post(format!("{node}/nodes/register"))
            .json(&json!({ "nodes": peers })),
        Command::Resolve => client.post(format!("{node}/nodes/resolve")),
        Command::Chain => client.get(format!("{node}/blockchain")),
    };

    debug!(?request, "sending request");
    let res = request.send().await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    println!("{body}");
    if !status.is_success() {
        bail!("node answered {status}");
    }
    Ok(())
}
