use crate::constants::{DEFAULT_LISTEN, DEFAULT_PEER_TIMEOUT_SECS};
use clap::Parser;
use powledger_core::MiningStrategy;
use std::{path::PathBuf, time::Duration};

#[derive(Parser, Debug, Clone)]
#[command(name = "powledger-node")]
#[command(about = "Proof-of-work ledger node with longest-chain conflict resolution")]
pub struct Config {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "POWLEDGER_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Data directory for sled. Without it the chain lives in memory only.
    #[arg(long, env = "POWLEDGER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Peer address to register at startup (repeatable, or comma separated)
    #[arg(long = "peer", env = "POWLEDGER_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Run conflict resolution every N seconds; 0 disables the background task
    #[arg(long, env = "POWLEDGER_RESOLVE_INTERVAL", default_value_t = 0)]
    pub resolve_interval_secs: u64,

    /// Per-request timeout when fetching a peer's chain
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_SECS)]
    pub peer_timeout_secs: u64,

    /// Search nonces on every core instead of a single thread
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub parallel_mining: bool,
}

impl Config {
    pub fn mining_strategy(&self) -> MiningStrategy {
        if self.parallel_mining {
            MiningStrategy::Parallel
        } else {
            MiningStrategy::Sequential
        }
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_secs(self.peer_timeout_secs)
    }

    pub fn resolve_interval(&self) -> Option<Duration> {
        (self.resolve_interval_secs > 0).then(|| Duration::from_secs(self.resolve_interval_secs))
    }
}
