use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod constants;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod mine;
pub mod pow;
pub mod resolve;
pub mod snapshot;
pub mod store;
pub mod validate;

pub use error::{ChainViolation, LedgerError, MiningError, PeerError};
pub use ledger::{ChainHead, Ledger, PendingReceipt};
pub use mine::MiningStrategy;
pub use pow::{Difficulty, ProofOfWork};
pub use resolve::{ConflictResolver, PeerClient, Resolution};
pub use snapshot::ChainSnapshot;
pub use store::ChainStore;
pub use validate::VerifiedChain;

/// Reference to an earlier transaction output being spent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(with = "hex_bytes")]
    pub txid: Vec<u8>,
    pub vout: u32,
    pub script_sig: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
}

/// A transfer as submitted by the identity layer. The ledger never checks
/// balances or signatures; `signature` is carried as opaque bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
    #[serde(default, with = "hex_opt")]
    pub signature: Option<Vec<u8>>,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            inputs: Vec::new(),
            outputs: Vec::new(),
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }
}

/// A block that has not been solved yet. Only the miner turns it into a [`Block`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub prev_hash: String,
}

impl Candidate {
    pub fn new(index: u64, prev_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        Self {
            index,
            timestamp: Utc::now(),
            transactions,
            prev_hash: prev_hash.into(),
        }
    }

    /// Candidate that extends `tip` with `transactions`.
    pub fn on_top_of(tip: &Block, transactions: Vec<Transaction>) -> Self {
        Self::new(tip.index + 1, tip.hash.clone(), transactions)
    }

    pub fn digest(&self, nonce: u64) -> String {
        hash::digest(
            self.index,
            &self.timestamp,
            &self.transactions,
            &self.prev_hash,
            nonce,
        )
    }

    /// Fix the nonce and record the resulting hash. No proof-of-work check happens here.
    pub fn seal(self, nonce: u64) -> Block {
        let hash = self.digest(nonce);
        self.seal_with_hash(nonce, hash)
    }

    pub(crate) fn seal_with_hash(self, nonce: u64, hash: String) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions,
            prev_hash: self.prev_hash,
            hash,
            nonce,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub prev_hash: String,
    pub hash: String,
    pub nonce: u64,
}

impl Block {
    /// Recompute the hash from the block's contents, ignoring the stored `hash`.
    pub fn compute_hash(&self) -> String {
        hash::digest(
            self.index,
            &self.timestamp,
            &self.transactions,
            &self.prev_hash,
            self.nonce,
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.prev_hash.is_empty()
    }
}

/// Empty block at index 0 with an empty prev-hash and nonce 0. It is not mined.
pub fn genesis_block() -> Block {
    Candidate::new(0, String::new(), Vec::new()).seal(0)
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| hex::decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
