use crate::{Block, Transaction};
use serde::{Deserialize, Serialize};

/// A ledger as seen from outside: what a peer answers when asked for its
/// chain. Plain data, never mutated into local state directly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    #[serde(default)]
    pub pending_pool: Vec<Transaction>,
    #[serde(default)]
    pub peers: Vec<String>,
}

impl ChainSnapshot {
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.chain.last()
    }
}
