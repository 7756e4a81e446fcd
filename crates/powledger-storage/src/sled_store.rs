use anyhow::{anyhow, bail, Context, Result};
use powledger_core::{Block, ChainStore};
use sled::{
  transaction::{ConflictableTransactionError, TransactionError},
  Db, IVec, Transactional, Tree,
};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const TREE_META: &str = "meta";
const KEY_LENGTH: &[u8] = b"length";

/// Blocks keyed by big-endian index, chain length kept in a separate tree.
/// Every write touches both trees inside one sled transaction.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
  meta: Tree,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let db = sled::open(path).with_context(|| format!("opening sled at {}", path.display()))?;
    let blocks = db.open_tree(TREE_BLOCKS)?;
    let meta = db.open_tree(TREE_META)?;
    info!("sled store opened at {}", path.display());
    Ok(Self { db, blocks, meta })
  }

  /// Number of stored blocks.
  pub fn len(&self) -> Result<u64> {
    match self.meta.get(KEY_LENGTH)? {
      Some(bytes) => decode_u64(&bytes),
      None => Ok(0),
    }
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }

  /// Index of the last stored block, `None` when empty.
  pub fn tip_height(&self) -> Result<Option<u64>> {
    Ok(self.len()?.checked_sub(1))
  }

  pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
    self
      .blocks
      .get(index.to_be_bytes())?
      .map(|ivec: IVec| {
        bincode::deserialize(&ivec).with_context(|| format!("decoding stored block {index}"))
      })
      .transpose()
  }

  pub fn clear(&self) -> Result<()> {
    self.blocks.clear()?;
    self.meta.clear()?;
    self.db.flush()?;
    Ok(())
  }
}

impl ChainStore for SledStore {
  fn load_chain(&self) -> Result<Vec<Block>> {
    let length = self.len()?;
    let mut chain = Vec::with_capacity(length as usize);
    for index in 0..length {
      let block = self
        .get_block(index)?
        .ok_or_else(|| anyhow!("block {index} missing below stored length {length}"))?;
      chain.push(block);
    }
    debug!(length, "loaded chain from sled");
    Ok(chain)
  }

  fn append_block(&self, block: &Block) -> Result<()> {
    let bytes = bincode::serialize(block)?;
    let index = block.index;

    (&self.blocks, &self.meta)
      .transaction(|(blocks, meta)| {
        let length = match meta.get(KEY_LENGTH)? {
          Some(v) => decode_u64(&v).map_err(ConflictableTransactionError::Abort)?,
          None => 0,
        };
        if index != length {
          return Err(ConflictableTransactionError::Abort(anyhow!(
            "cannot append block {index} to a chain of length {length}"
          )));
        }
        blocks.insert(&index.to_be_bytes()[..], bytes.as_slice())?;
        meta.insert(KEY_LENGTH, &(length + 1).to_be_bytes()[..])?;
        Ok(())
      })
      .map_err(flatten)?;

    self.db.flush()?;
    Ok(())
  }

  fn replace_chain(&self, chain: &[Block]) -> Result<()> {
    if chain.is_empty() {
      bail!("refusing to replace the stored chain with an empty one");
    }
    let encoded = chain
      .iter()
      .map(|block| -> Result<(u64, Vec<u8>)> { Ok((block.index, bincode::serialize(block)?)) })
      .collect::<Result<Vec<_>>>()?;
    let new_length = chain.len() as u64;

    (&self.blocks, &self.meta)
      .transaction(|(blocks, meta)| {
        let old_length = match meta.get(KEY_LENGTH)? {
          Some(v) => decode_u64(&v).map_err(ConflictableTransactionError::Abort)?,
          None => 0,
        };
        for (index, bytes) in &encoded {
          blocks.insert(&index.to_be_bytes()[..], bytes.as_slice())?;
        }
        for stale in new_length..old_length {
          blocks.remove(&stale.to_be_bytes()[..])?;
        }
        meta.insert(KEY_LENGTH, &new_length.to_be_bytes()[..])?;
        Ok(())
      })
      .map_err(flatten)?;

    self.db.flush()?;
    info!(length = new_length, "replaced stored chain");
    Ok(())
  }

  fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
  let arr: [u8; 8] = bytes
    .try_into()
    .map_err(|_| anyhow!("corrupt length entry of {} bytes", bytes.len()))?;
  Ok(u64::from_be_bytes(arr))
}

fn flatten(err: TransactionError<anyhow::Error>) -> anyhow::Error {
  match err {
    TransactionError::Abort(err) => err,
    TransactionError::Storage(err) => err.into(),
  }
}
