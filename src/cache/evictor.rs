//! Eviction policy: least-recently-used over the semantic tier.
//!
//! Reads count as accesses: a semantic hit refreshes `last_accessed`, so an
//! entry that keeps being matched survives even if it was inserted early.
//! Ties on `last_accessed` go to the lowest id.

use std::cmp::Ordering;

use crate::cache::entry::{EntryId, EntryPayload};

/// An eviction candidate ordered by eviction priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub entry_id: EntryId,
    pub last_accessed: u64,
}

// Greater = evicted first: older access, then lower id.
impl Ord for EvictionCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .last_accessed
            .cmp(&self.last_accessed)
            .then_with(|| other.entry_id.cmp(&self.entry_id))
    }
}

impl PartialOrd for EvictionCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The LRU victim selector.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evictor;

impl Evictor {
    pub fn new() -> Self {
        Self
    }

    /// The single least-recently-accessed entry, if any.
    pub fn select_victim<'a>(
        &self,
        entries: impl Iterator<Item = (EntryId, &'a EntryPayload)>,
    ) -> Option<EvictionCandidate> {
        entries
            .map(|(entry_id, payload)| EvictionCandidate {
                entry_id,
                last_accessed: payload.last_accessed,
            })
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(last_accessed: u64) -> EntryPayload {
        EntryPayload::new("prompt", "a cached response", last_accessed)
    }

    #[test]
    fn test_selects_oldest_access() {
        let entries = vec![(1, payload(30)), (2, payload(10)), (3, payload(20))];
        let victim = Evictor::new()
            .select_victim(entries.iter().map(|(id, p)| (*id, p)))
            .unwrap();
        assert_eq!(victim.entry_id, 2);
    }

    #[test]
    fn test_tie_breaks_on_lowest_id() {
        let entries = vec![(7, payload(5)), (3, payload(5)), (9, payload(5))];
        let victim = Evictor::new()
            .select_victim(entries.iter().map(|(id, p)| (*id, p)))
            .unwrap();
        assert_eq!(victim.entry_id, 3);
    }

    #[test]
    fn test_empty_has_no_victim() {
        let entries: Vec<(EntryId, EntryPayload)> = vec![];
        assert!(Evictor::new()
            .select_victim(entries.iter().map(|(id, p)| (*id, p)))
            .is_none());
    }
}
