use crate::{error::ChainViolation, pow::ProofOfWork, Block};
use tracing::debug;

/// Walk `chain` from position 0 and report the first violation.
///
/// Every block must sit at `index == position`, store the hash of its own
/// contents, and point at its predecessor's hash (the first block points at
/// the empty string). Every block except the one at position 0 must also
/// satisfy `pow`.
///
/// The genesis exemption is deliberate: genesis is created with nonce 0 and is
/// never mined, so requiring proof-of-work of it would reject every chain this
/// ledger creates. Its hash and linkage are still checked.
pub fn validate_chain<P: ProofOfWork + ?Sized>(
    chain: &[Block],
    pow: &P,
) -> Result<(), ChainViolation> {
    if chain.is_empty() {
        return Err(ChainViolation::Empty);
    }

    let mut expected_prev = "";
    for (position, block) in chain.iter().enumerate() {
        let position = position as u64;
        if block.index != position {
            return Err(ChainViolation::IndexMismatch {
                position,
                index: block.index,
            });
        }

        let computed = block.compute_hash();
        if block.hash != computed {
            return Err(ChainViolation::HashMismatch {
                index: block.index,
                stored: block.hash.clone(),
                computed,
            });
        }

        if block.prev_hash != expected_prev {
            return Err(ChainViolation::BrokenLink {
                index: block.index,
                expected: expected_prev.to_string(),
                found: block.prev_hash.clone(),
            });
        }

        if position > 0 && !pow.is_satisfied(&block.hash) {
            return Err(ChainViolation::InsufficientWork {
                index: block.index,
                hash: block.hash.clone(),
            });
        }

        expected_prev = &block.hash;
    }
    Ok(())
}

pub fn is_valid_chain<P: ProofOfWork + ?Sized>(chain: &[Block], pow: &P) -> bool {
    match validate_chain(chain, pow) {
        Ok(()) => true,
        Err(violation) => {
            debug!(%violation, "chain rejected");
            false
        }
    }
}

/// A chain that passed [`validate_chain`]. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedChain(Vec<Block>);

impl VerifiedChain {
    pub fn verify<P: ProofOfWork + ?Sized>(
        chain: Vec<Block>,
        pow: &P,
    ) -> Result<Self, ChainViolation> {
        validate_chain(&chain, pow)?;
        Ok(Self(chain))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tip(&self) -> &Block {
        &self.0[self.0.len() - 1]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Block> {
        self.0
    }
}
