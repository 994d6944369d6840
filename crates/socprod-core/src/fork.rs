//! Fork choice between finalized chains.

use socprod_types::Hash;
use std::cmp::Ordering;

/// A chain tip considered by fork choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tip {
    pub height: u64,
    pub hash: Hash,
}

impl Tip {
    pub fn new(height: u64, hash: Hash) -> Self {
        Self { height, hash }
    }
}

/// Longest chain wins. Between equal heights the lexicographically smaller
/// head hash wins, so every node picks the same head regardless of the order
/// in which the competing tips arrived.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForkChoice;

impl ForkChoice {
    /// Order two tips, `Ordering::Greater` meaning `a` is preferred.
    pub fn compare(a: &Tip, b: &Tip) -> Ordering {
        a.height
            .cmp(&b.height)
            .then_with(|| b.hash.cmp(&a.hash))
    }

    /// True if `candidate` should replace `current` as head.
    pub fn prefers(candidate: &Tip, current: &Tip) -> bool {
        Self::compare(candidate, current) == Ordering::Greater
    }

    /// Pick the preferred tip out of a set.
    pub fn best<'a>(tips: impl IntoIterator<Item = &'a Tip>) -> Option<&'a Tip> {
        tips.into_iter().max_by(|a, b| Self::compare(a, b))
    }
}
