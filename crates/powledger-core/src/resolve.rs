//! Longest-valid-chain conflict resolution.
//!
//! One attempt fetches every known peer's snapshot, keeps the best valid
//! chain that beats the local one and swaps it in. It is a heuristic: nothing
//! coordinates simultaneous resolutions across nodes, and a long valid chain
//! from a hostile peer wins like any other.

use crate::{
    error::{LedgerError, PeerError},
    ledger::Ledger,
    pow::ProofOfWork,
    snapshot::ChainSnapshot,
    validate::VerifiedChain,
    Block,
};
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use tracing::{debug, info, warn};

/// Transport used to ask a peer for its ledger.
pub trait PeerClient: Send + Sync {
    fn fetch_snapshot(
        &self,
        peer: &str,
    ) -> impl Future<Output = Result<ChainSnapshot, PeerError>> + Send;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Resolution {
    #[serde(rename_all = "camelCase")]
    Replaced {
        peer: String,
        previous_length: usize,
        new_length: usize,
    },
    Unchanged { length: usize },
}

impl Resolution {
    pub fn replaced(&self) -> bool {
        matches!(self, Resolution::Replaced { .. })
    }

    pub fn length(&self) -> usize {
        match self {
            Resolution::Replaced { new_length, .. } => *new_length,
            Resolution::Unchanged { length } => *length,
        }
    }
}

/// Tie-break between chains: longer wins; at equal length the greater tip
/// nonce wins. The nonce is only a rough proxy for work spent.
pub fn beats(length: usize, tip_nonce: u64, best_length: usize, best_tip_nonce: u64) -> bool {
    length > best_length || (length == best_length && tip_nonce > best_tip_nonce)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Winner {
    pub peer: String,
    pub chain: VerifiedChain,
}

/// Pick the best valid candidate that beats `(local_length, local_tip_nonce)`.
/// Candidates are visited in order; only those that would win are validated.
pub fn select_best<P, I>(
    local_length: usize,
    local_tip_nonce: u64,
    candidates: I,
    pow: &P,
) -> Option<Winner>
where
    P: ProofOfWork + ?Sized,
    I: IntoIterator<Item = (String, Vec<Block>)>,
{
    let mut best = (local_length, local_tip_nonce);
    let mut winner = None;

    for (peer, chain) in candidates {
        let Some(tip_nonce) = chain.last().map(|tip| tip.nonce) else {
            debug!(%peer, "peer sent an empty chain");
            continue;
        };
        let length = chain.len();
        if !beats(length, tip_nonce, best.0, best.1) {
            continue;
        }
        match VerifiedChain::verify(chain, pow) {
            Ok(chain) => {
                best = (length, tip_nonce);
                winner = Some(Winner { peer, chain });
            }
            Err(violation) => warn!(%peer, %violation, "rejecting invalid chain"),
        }
    }
    winner
}

pub struct ConflictResolver<C> {
    client: C,
}

impl<C: PeerClient> ConflictResolver<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run one resolution attempt against every peer `ledger` knows.
    /// A failing peer is logged and skipped; it never aborts the attempt.
    pub async fn resolve<P: ProofOfWork>(
        &self,
        ledger: &Ledger<P>,
    ) -> Result<Resolution, LedgerError> {
        let peers = ledger.peers();
        let head = ledger.head();

        let fetches = peers.iter().map(|peer| async move {
            let result = self.client.fetch_snapshot(peer).await;
            (peer, result)
        });
        let candidates = join_all(fetches)
            .await
            .into_iter()
            .filter_map(|(peer, result)| match result {
                Ok(snapshot) => Some((peer.clone(), snapshot.chain)),
                Err(error) => {
                    warn!(%peer, %error, "skipping peer");
                    None
                }
            });

        let Some(winner) = select_best(head.length, head.nonce, candidates, ledger.pow()) else {
            debug!(length = head.length, "no peer chain beats the local chain");
            return Ok(Resolution::Unchanged {
                length: head.length,
            });
        };

        let new_length = winner.chain.len();
        if let Some(previous_length) = ledger.adopt_if_better(winner.chain)? {
            info!(peer = %winner.peer, previous = previous_length, length = new_length, "adopted peer chain");
            Ok(Resolution::Replaced {
                peer: winner.peer,
                previous_length,
                new_length,
            })
        } else {
            // The local chain grew past the winner while we were fetching.
            Ok(Resolution::Unchanged {
                length: ledger.chain_len(),
            })
        }
    }
}
