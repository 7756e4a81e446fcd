use crate::Block;
use anyhow::Result;

/// Trait the storage backends implement so a ledger can persist its chain.
/// This lives in `powledger-core` to avoid a circular dependency.
pub trait ChainStore: Send + Sync {
    /// All stored blocks in index order; empty for a fresh store.
    fn load_chain(&self) -> Result<Vec<Block>>;
    /// Store `block` as the new tip.
    fn append_block(&self, block: &Block) -> Result<()>;
    /// Replace the whole stored chain. Must be all-or-nothing.
    fn replace_chain(&self, chain: &[Block]) -> Result<()>;
    fn close(&self) -> Result<()>;
}
