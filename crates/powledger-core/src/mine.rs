use crate::{
    constants::CANCEL_CHECK_INTERVAL, error::MiningError, hash, pow::ProofOfWork, Block, Candidate,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// How the ledger searches for a nonce. Both strategies yield the same block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MiningStrategy {
    #[default]
    Sequential,
    Parallel,
}

impl MiningStrategy {
    pub fn run<P: ProofOfWork + ?Sized>(
        self,
        candidate: Candidate,
        pow: &P,
        cancel: Option<&AtomicBool>,
    ) -> Result<Block, MiningError> {
        match self {
            MiningStrategy::Sequential => search(candidate, pow, cancel),
            MiningStrategy::Parallel => search_parallel(candidate, pow, cancel),
        }
    }
}

/// Increment the nonce from 0 until `pow` accepts the hash.
pub fn mine<P: ProofOfWork + ?Sized>(candidate: Candidate, pow: &P) -> Result<Block, MiningError> {
    search(candidate, pow, None)
}

/// Like [`mine`], giving up with [`MiningError::Cancelled`] once `cancel` is set.
pub fn mine_cancellable<P: ProofOfWork + ?Sized>(
    candidate: Candidate,
    pow: &P,
    cancel: &AtomicBool,
) -> Result<Block, MiningError> {
    search(candidate, pow, Some(cancel))
}

/// Searches nonces across the rayon pool. `find_map_first` keeps the lowest
/// satisfying nonce, so the result equals [`mine`]'s.
pub fn mine_parallel<P: ProofOfWork + ?Sized>(
    candidate: Candidate,
    pow: &P,
) -> Result<Block, MiningError> {
    search_parallel(candidate, pow, None)
}

fn search<P: ProofOfWork + ?Sized>(
    candidate: Candidate,
    pow: &P,
    cancel: Option<&AtomicBool>,
) -> Result<Block, MiningError> {
    let prefix = prefix_of(&candidate);
    for nonce in 0..=u64::MAX {
        if nonce % CANCEL_CHECK_INTERVAL == 0 && is_cancelled(cancel) {
            return Err(MiningError::Cancelled);
        }
        let hash = hash::finish(&prefix, nonce);
        if pow.is_satisfied(&hash) {
            return Ok(solved(candidate, nonce, hash));
        }
    }
    Err(MiningError::NonceSpaceExhausted)
}

fn search_parallel<P: ProofOfWork + ?Sized>(
    candidate: Candidate,
    pow: &P,
    cancel: Option<&AtomicBool>,
) -> Result<Block, MiningError> {
    let prefix = prefix_of(&candidate);
    let found = (0..=u64::MAX).into_par_iter().find_map_first(|nonce| {
        if is_cancelled(cancel) {
            return Some(None);
        }
        let hash = hash::finish(&prefix, nonce);
        pow.is_satisfied(&hash).then(|| Some((nonce, hash)))
    });

    match found {
        Some(Some((nonce, hash))) => Ok(solved(candidate, nonce, hash)),
        Some(None) => Err(MiningError::Cancelled),
        None => Err(MiningError::NonceSpaceExhausted),
    }
}

fn prefix_of(candidate: &Candidate) -> sha2::Sha256 {
    hash::prefix_hasher(
        candidate.index,
        &candidate.timestamp,
        &candidate.transactions,
        &candidate.prev_hash,
    )
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn solved(candidate: Candidate, nonce: u64, hash: String) -> Block {
    info!(
        "Mined block {} with nonce {} and hash {}",
        candidate.index, nonce, hash
    );
    candidate.seal_with_hash(nonce, hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::{is_valid, Difficulty};
    use crate::Transaction;
    use chrono::{TimeZone, Utc};

    fn fixed_candidate() -> Candidate {
        Candidate {
            index: 1,
            timestamp: Utc.timestamp_opt(1_600_000_000, 123_456_789).unwrap(),
            transactions: vec![
                Transaction::new("Alice", "Bob", 10),
                Transaction::new("Bob", "Charlie", 5),
            ],
            prev_hash: String::new(),
        }
    }

    #[test]
    fn mine_block_example() {
        let mined = mine(fixed_candidate(), &Difficulty::new(2)).unwrap();
        assert_eq!(mined.nonce, 445);
        assert_eq!(
            mined.hash,
            "00676e58e1349eda7c558d5d0e3f5d0ab4ef5ab133e604576bdcd10acc5faa64"
        );
        assert_eq!(mined.hash, mined.compute_hash());
    }

    #[test]
    fn mine_at_default_difficulty_is_valid() {
        let mined = mine(fixed_candidate(), &Difficulty::default()).unwrap();
        assert_eq!(mined.nonce, 11893);
        assert!(is_valid(&mined.hash));
        assert_eq!(mined.hash, mined.compute_hash());
    }

    #[test]
    fn trivial_predicate_stops_at_zero() {
        let mined = mine(fixed_candidate(), &Difficulty::new(0)).unwrap();
        assert_eq!(mined.nonce, 0);
    }

    #[test]
    fn mined_block_keeps_candidate_contents() {
        let candidate = fixed_candidate();
        let mined = mine(candidate.clone(), &Difficulty::new(1)).unwrap();
        assert_eq!(mined.index, candidate.index);
        assert_eq!(mined.timestamp, candidate.timestamp);
        assert_eq!(mined.transactions, candidate.transactions);
        assert_eq!(mined.prev_hash, candidate.prev_hash);
    }

    #[test]
    fn empty_candidate_can_be_mined() {
        let mut candidate = fixed_candidate();
        candidate.transactions.clear();
        let mined = mine(candidate, &Difficulty::new(2)).unwrap();
        assert!(mined.transactions.is_empty());
        assert!(mined.hash.starts_with("00"));
    }

    #[test]
    fn parallel_finds_the_same_nonce() {
        for zeros in 1..=3 {
            let pow = Difficulty::new(zeros);
            let sequential = mine(fixed_candidate(), &pow).unwrap();
            let parallel = mine_parallel(fixed_candidate(), &pow).unwrap();
            assert_eq!(sequential, parallel);
        }
    }

    #[test]
    fn cancelled_search_produces_no_block() {
        let cancel = AtomicBool::new(true);
        let never = |_: &str| false;
        assert_eq!(
            mine_cancellable(fixed_candidate(), &never, &cancel),
            Err(MiningError::Cancelled)
        );
        assert_eq!(
            MiningStrategy::Parallel.run(fixed_candidate(), &never, Some(&cancel)),
            Err(MiningError::Cancelled)
        );
    }

    #[test]
    fn unset_cancel_flag_does_not_interfere() {
        let cancel = AtomicBool::new(false);
        let mined = mine_cancellable(fixed_candidate(), &Difficulty::new(2), &cancel).unwrap();
        assert_eq!(mined.nonce, 445);
    }
}
