use crate::{
    error::LedgerError,
    genesis_block,
    mine::MiningStrategy,
    pow::{Difficulty, ProofOfWork},
    resolve::beats,
    snapshot::ChainSnapshot,
    store::ChainStore,
    validate::VerifiedChain,
    Block, Candidate, Transaction,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    sync::{atomic::AtomicBool, Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{info, warn};

/// Where a submitted transaction landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReceipt {
    /// 0-based position in the pending pool.
    pub position: usize,
    /// Index of the block that will carry the transaction if it is mined next.
    pub expected_block: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub length: usize,
    pub hash: String,
    pub nonce: u64,
}

struct LedgerState {
    /// Never empty; block `i` links to block `i - 1`.
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    peers: BTreeSet<String>,
}

impl LedgerState {
    fn with_chain(chain: Vec<Block>) -> Self {
        Self {
            chain,
            pending: Vec::new(),
            peers: BTreeSet::new(),
        }
    }

    fn tip(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }
}

/// The locally authoritative chain, its pending pool and known peers.
///
/// All state sits behind one mutex. Mining takes a second mutex so that only
/// one search runs at a time, and performs the search without holding the
/// state lock: submissions keep flowing while a block is being solved.
pub struct Ledger<P: ProofOfWork = Difficulty> {
    state: Mutex<LedgerState>,
    mining: Mutex<()>,
    pow: P,
    strategy: MiningStrategy,
    store: Option<Arc<dyn ChainStore>>,
}

impl Ledger<Difficulty> {
    pub fn new() -> Self {
        Self::with_pow(Difficulty::default())
    }
}

impl Default for Ledger<Difficulty> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ProofOfWork> Ledger<P> {
    /// In-memory ledger holding only a fresh genesis block.
    pub fn with_pow(pow: P) -> Self {
        Self {
            state: Mutex::new(LedgerState::with_chain(vec![genesis_block()])),
            mining: Mutex::new(()),
            pow,
            strategy: MiningStrategy::default(),
            store: None,
        }
    }

    /// Load the chain from `store`, writing a genesis block if the store is empty.
    /// A stored chain that fails validation is refused.
    pub fn open(store: Arc<dyn ChainStore>, pow: P) -> Result<Self, LedgerError> {
        let stored = store.load_chain().map_err(LedgerError::Storage)?;
        let chain = if stored.is_empty() {
            let genesis = genesis_block();
            store
                .append_block(&genesis)
                .map_err(LedgerError::Storage)?;
            info!("store was empty, wrote genesis block {}", genesis.hash);
            vec![genesis]
        } else {
            VerifiedChain::verify(stored, &pow)?.into_inner()
        };
        info!(length = chain.len(), "ledger opened from store");

        Ok(Self {
            state: Mutex::new(LedgerState::with_chain(chain)),
            mining: Mutex::new(()),
            pow,
            strategy: MiningStrategy::default(),
            store: Some(store),
        })
    }

    pub fn with_strategy(mut self, strategy: MiningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn pow(&self) -> &P {
        &self.pow
    }

    // State is only ever changed by whole-value pushes, drains and swaps, so a
    // panic elsewhere cannot leave it half-written.
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `tx` for the next block. Never fails and never validates.
    pub fn submit_transaction(&self, tx: Transaction) -> PendingReceipt {
        let mut state = self.state();
        state.pending.push(tx);
        PendingReceipt {
            position: state.pending.len() - 1,
            expected_block: state.tip().index + 1,
        }
    }

    /// Package the pending pool into a block on top of the tip, solve it and append it.
    pub fn mine_next(&self) -> Result<Block, LedgerError> {
        self.mine_with(None)
    }

    /// Like [`Ledger::mine_next`]; once `cancel` is set the search stops, no block
    /// is produced and the pool is left untouched.
    pub fn mine_next_cancellable(&self, cancel: &AtomicBool) -> Result<Block, LedgerError> {
        self.mine_with(Some(cancel))
    }

    fn mine_with(&self, cancel: Option<&AtomicBool>) -> Result<Block, LedgerError> {
        let _mining = self.mining.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            let (candidate, taken) = {
                let state = self.state();
                (
                    Candidate::on_top_of(state.tip(), state.pending.clone()),
                    state.pending.len(),
                )
            };

            let block = self.strategy.run(candidate, &self.pow, cancel)?;

            let mut state = self.state();
            if state.tip().hash != block.prev_hash {
                // A resolution swapped the chain; rebuild on the new tip.
                warn!(
                    index = block.index,
                    "chain was replaced while mining; retrying on top of {}",
                    state.tip().hash
                );
                continue;
            }
            if let Some(store) = &self.store {
                store.append_block(&block).map_err(LedgerError::Storage)?;
            }
            state.chain.push(block.clone());
            // Only the mined prefix leaves the pool; later submissions stay queued.
            state.pending.drain(..taken);
            info!(
                index = block.index,
                txs = block.transactions.len(),
                "appended block {}",
                block.hash
            );
            return Ok(block);
        }
    }

    /// Add a peer address. Returns `false` if it was already known or blank.
    pub fn register_peer(&self, address: &str) -> bool {
        let address = address.trim();
        if address.is_empty() {
            return false;
        }
        self.state().peers.insert(address.to_string())
    }

    pub fn peers(&self) -> Vec<String> {
        self.state().peers.iter().cloned().collect()
    }

    pub fn chain(&self) -> Vec<Block> {
        self.state().chain.clone()
    }

    pub fn chain_len(&self) -> usize {
        self.state().chain.len()
    }

    pub fn last_block(&self) -> Block {
        self.state().tip().clone()
    }

    pub fn head(&self) -> ChainHead {
        let state = self.state();
        let tip = state.tip();
        ChainHead {
            length: state.chain.len(),
            hash: tip.hash.clone(),
            nonce: tip.nonce,
        }
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.state().pending.clone()
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        let state = self.state();
        ChainSnapshot {
            chain: state.chain.clone(),
            pending_pool: state.pending.clone(),
            peers: state.peers.iter().cloned().collect(),
        }
    }

    /// Swap in `candidate` if it still beats the local chain: longer, or equally
    /// long with a greater tip nonce. The check and the swap happen under one
    /// lock, so readers see either the old chain or the new one.
    ///
    /// Returns the length of the chain that was replaced, `None` if kept.
    pub fn adopt_if_better(
        &self,
        candidate: VerifiedChain,
    ) -> Result<Option<usize>, LedgerError> {
        let mut state = self.state();
        let local = state.tip();
        if !beats(
            candidate.len(),
            candidate.tip().nonce,
            state.chain.len(),
            local.nonce,
        ) {
            return Ok(None);
        }

        if let Some(store) = &self.store {
            store
                .replace_chain(candidate.blocks())
                .map_err(LedgerError::Storage)?;
        }
        let previous = std::mem::replace(&mut state.chain, candidate.into_inner());
        info!(
            previous = previous.len(),
            length = state.chain.len(),
            "replaced local chain"
        );
        Ok(Some(previous.len()))
    }
}
