//! Bounded recency cache of creatures already described to a client.
//!
//! The first time a creature appears in a session's view its full record
//! goes on the wire; afterwards a short id reference suffices, as long as
//! the cache still holds it. The cache is capped, so admitting a new id past
//! the cap evicts an old one, and the eviction is reported to the peer
//! inside the same creature record so both sides forget the same creature.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

/// Cache capacity, and also the eviction scan budget.
pub const KNOWN_CREATURE_LIMIT: usize = 1300;

/// Outcome of noting one creature reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    /// The peer already knows this creature; send the short form.
    pub known: bool,
    /// Id the peer must drop to make room, 0 for none.
    pub evicted: u32,
}

/// Insertion/recency-ordered set of creature ids, oldest at the head.
#[derive(Debug, Default)]
pub struct KnownCreatures {
    order: VecDeque<u32>,
    present: FxHashSet<u32>,
}

impl KnownCreatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a reference to `id` ahead of encoding it.
    ///
    /// A known id is refreshed to most-recent and reported known. An unknown
    /// id is admitted; if that overflows the cap, the head-side scan looks
    /// for the first entry `still_visible` disclaims and evicts it. When
    /// every scanned entry is still visible the oldest entry is evicted
    /// anyway: the client may briefly hold a stale record for a creature in
    /// view, which the next full description corrects.
    pub fn note<F>(&mut self, id: u32, mut still_visible: F) -> Reference
    where
        F: FnMut(u32) -> bool,
    {
        if self.present.contains(&id) {
            if let Some(at) = self.order.iter().position(|&held| held == id) {
                self.order.remove(at);
                self.order.push_back(id);
            }
            return Reference {
                known: true,
                evicted: 0,
            };
        }

        self.present.insert(id);
        self.order.push_back(id);
        if self.order.len() <= KNOWN_CREATURE_LIMIT {
            return Reference {
                known: false,
                evicted: 0,
            };
        }

        // Never scan the entry just added; it is about to be described.
        let budget = KNOWN_CREATURE_LIMIT.min(self.order.len() - 1);
        let mut victim = 0usize;
        for at in 0..budget {
            if !still_visible(self.order[at]) {
                victim = at;
                break;
            }
        }

        let evicted = self.order[victim];
        self.order.remove(victim);
        self.present.remove(&evicted);
        Reference {
            known: false,
            evicted,
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.present.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
