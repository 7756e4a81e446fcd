use crate::constants::POW_DIFFICULTY;

/// Stopping condition for the nonce search and the check the validator re-applies.
pub trait ProofOfWork: Send + Sync {
    fn is_satisfied(&self, hash: &str) -> bool;
}

impl<F> ProofOfWork for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_satisfied(&self, hash: &str) -> bool {
        self(hash)
    }
}

/// Required number of leading `'0'` hex digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Difficulty {
    leading_zeros: usize,
}

impl Difficulty {
    pub const fn new(leading_zeros: usize) -> Self {
        Self { leading_zeros }
    }

    pub const fn leading_zeros(&self) -> usize {
        self.leading_zeros
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::new(POW_DIFFICULTY)
    }
}

impl ProofOfWork for Difficulty {
    fn is_satisfied(&self, hash: &str) -> bool {
        count_leading_zero_digits(hash) >= self.leading_zeros
    }
}

/// True iff the first four hex digits of `hash` are `'0'`.
pub fn is_valid(hash: &str) -> bool {
    Difficulty::default().is_satisfied(hash)
}

pub fn count_leading_zero_digits(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}
