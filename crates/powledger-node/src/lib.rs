//! HTTP node around a [`powledger_core::Ledger`]: the chain-exchange
//! endpoint peers resolve against, plus the client-facing routes.

pub mod api;
pub mod config;
mod constants;
pub mod peer;

use anyhow::Context;
use api::AppState;
use config::Config;
use peer::HttpPeerClient;
use powledger_core::{pow::Difficulty, Ledger};
use powledger_storage::SledStore;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{info, warn};

/// Build the ledger described by `config`, restoring it from sled when a
/// data directory is given.
pub fn build_ledger(config: &Config) -> anyhow::Result<Ledger> {
    let ledger = match &config.data_dir {
        Some(dir) => {
            let store = SledStore::open(dir)?;
            Ledger::open(Arc::new(store), Difficulty::default())
                .with_context(|| format!("restoring chain from {}", dir.display()))?
        }
        None => Ledger::new(),
    };
    let ledger = ledger.with_strategy(config.mining_strategy());
    for peer in &config.peers {
        ledger.register_peer(peer);
    }
    Ok(ledger)
}

/// Re-run conflict resolution every `every`, starting one period from now.
pub fn spawn_resolver(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match state.resolve().await {
                Ok(resolution) if resolution.replaced() => {
                    info!(length = resolution.length(), "background resolution adopted a peer chain")
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "background resolution failed"),
            }
        }
    })
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let ledger = build_ledger(&config)?;
    let client = HttpPeerClient::new(config.peer_timeout())?;
    let state = AppState::new(ledger, client);

    if let Some(every) = config.resolve_interval() {
        spawn_resolver(state.clone(), every);
    }

    let listener = TcpListener::bind(&config.listen).await?;
    info!("powledger-node listening on http://{}", listener.local_addr()?);
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("powledger-node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "could not listen for ctrl-c; shutting down");
    }
}
