use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MiningError {
    #[error("mining failed: exhausted nonce range without finding a valid hash")]
    NonceSpaceExhausted,

    #[error("mining cancelled before a valid nonce was found")]
    Cancelled,
}

/// First integrity violation found while walking a chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    #[error("chain is empty")]
    Empty,

    #[error("block at position {position} carries index {index}")]
    IndexMismatch { position: u64, index: u64 },

    #[error("block {index}: stored hash {stored} does not match recomputed {computed}")]
    HashMismatch {
        index: u64,
        stored: String,
        computed: String,
    },

    #[error("block {index}: prev_hash {found:?} does not match predecessor hash {expected:?}")]
    BrokenLink {
        index: u64,
        expected: String,
        found: String,
    },

    #[error("block {index}: hash {hash} does not satisfy proof-of-work")]
    InsufficientWork { index: u64, hash: String },
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Mining(#[from] MiningError),

    #[error("invalid chain: {0}")]
    InvalidChain(#[from] ChainViolation),

    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

/// Failure to obtain a usable snapshot from one peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    #[error("peer {peer} answered with status {status}")]
    Status { peer: String, status: u16 },

    #[error("peer {peer} sent a malformed snapshot: {reason}")]
    Malformed { peer: String, reason: String },
}
