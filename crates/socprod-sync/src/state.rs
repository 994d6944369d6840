use serde::{Deserialize, Serialize};
use socprod_types::{Hash, PeerId};

/// What the local node knows about one peer's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub peer: PeerId,
    pub head_height: u64,
    pub head_hash: Hash,
    /// Block requests awaiting an answer
    pub outstanding: usize,
    /// Consecutive requests that went unanswered
    pub failures: u32,
    /// Where the next header request starts when walking back to a fork point
    #[serde(skip)]
    pub(crate) rewind_to: Option<u64>,
}

impl SyncState {
    pub fn new(peer: PeerId, head_height: u64, head_hash: Hash) -> Self {
        Self {
            peer,
            head_height,
            head_hash,
            outstanding: 0,
            failures: 0,
            rewind_to: None,
        }
    }

    /// Heights the peer has that the local chain does not.
    pub fn missing_range(&self, local_height: u64) -> Option<(u64, u64)> {
        (self.head_height > local_height).then(|| (local_height + 1, self.head_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_range() {
        let state = SyncState::new(PeerId::from("a"), 50, Hash::ZERO);
        assert_eq!(state.missing_range(0), Some((1, 50)));
        assert_eq!(state.missing_range(49), Some((50, 50)));
        assert_eq!(state.missing_range(50), None);
        assert_eq!(state.missing_range(60), None);
    }
}
