//! Login queue for a full world.
//!
//! Applicants past the player cap take a numbered slot and are told when to
//! retry; the retry time grows with the slot and the wire carries it as one
//! byte. An entry lives a little longer than its retry time, so a client
//! that reconnects on schedule keeps its place and one that gives up falls
//! out of the queue.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use eldermoor_world::CharacterId;

/// Grace past the announced retry time before a queued entry expires.
const ENTRY_GRACE_SECS: u64 = 10;

struct Entry {
    character: CharacterId,
    deadline: Instant,
}

/// Ordered queue of characters waiting for a free player slot.
#[derive(Default)]
pub struct WaitingList {
    queue: VecDeque<Entry>,
}

impl WaitingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Seconds after which a slot holder should retry.
    pub fn retry_secs(slot: usize, cap_secs: u32) -> u8 {
        let ramp = 5 * slot as u64 + 5;
        ramp.min(u64::from(cap_secs)).min(u64::from(u8::MAX)) as u8
    }

    /// The refusal text shown with the retry time.
    pub fn notice(slot: usize) -> String {
        format!("Too many players online.\nYou are at {slot} place on the waiting list.")
    }

    /// Admit `character` or queue it. `Err(slot)` reports the 1-based queue
    /// position; a queued character keeps its position across retries as
    /// long as it returns within the grace window.
    pub fn try_admit(
        &mut self,
        character: CharacterId,
        privileged: bool,
        online: u32,
        max_players: u32,
        retry_cap_secs: u32,
        now: Instant,
    ) -> Result<(), usize> {
        if privileged || (online < max_players && self.queue.is_empty()) {
            return Ok(());
        }

        self.prune(now);

        if let Some(index) = self.queue.iter().position(|e| e.character == character) {
            let slot = index + 1;
            if online + slot as u32 <= max_players {
                self.queue.remove(index);
                return Ok(());
            }
            // Returned in time: keep the position, extend the deadline.
            if let Some(entry) = self.queue.get_mut(index) {
                entry.deadline = Self::deadline(slot, retry_cap_secs, now);
            }
            return Err(slot);
        }

        let slot = self.queue.len() + 1;
        self.queue.push_back(Entry {
            character,
            deadline: Self::deadline(slot, retry_cap_secs, now),
        });
        Err(slot)
    }

    /// Drop entries whose holders stopped retrying.
    pub fn prune(&mut self, now: Instant) {
        self.queue.retain(|entry| entry.deadline > now);
    }

    fn deadline(slot: usize, cap_secs: u32, now: Instant) -> Instant {
        now + Duration::from_secs(u64::from(Self::retry_secs(slot, cap_secs)) + ENTRY_GRACE_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: u32 = 120;

    fn id(n: u32) -> CharacterId {
        CharacterId(n)
    }

    #[test]
    fn test_admits_under_cap_with_empty_queue() {
        let mut list = WaitingList::new();
        assert_eq!(list.try_admit(id(1), false, 10, 50, CAP, Instant::now()), Ok(()));
        assert!(list.is_empty());
    }

    #[test]
    fn test_privileged_login_bypasses_cap() {
        let mut list = WaitingList::new();
        assert_eq!(list.try_admit(id(1), true, 50, 50, CAP, Instant::now()), Ok(()));
    }

    #[test]
    fn test_full_world_queues_in_arrival_order() {
        let mut list = WaitingList::new();
        let now = Instant::now();
        assert_eq!(list.try_admit(id(1), false, 50, 50, CAP, now), Err(1));
        assert_eq!(list.try_admit(id(2), false, 50, 50, CAP, now), Err(2));
        assert_eq!(
            list.try_admit(id(1), false, 50, 50, CAP, now),
            Err(1),
            "a returning applicant keeps its slot"
        );
    }

    #[test]
    fn test_queued_character_admitted_when_room_opens() {
        let mut list = WaitingList::new();
        let now = Instant::now();
        assert_eq!(list.try_admit(id(1), false, 50, 50, CAP, now), Err(1));
        // One player logged out; online + slot fits the cap again.
        assert_eq!(list.try_admit(id(1), false, 49, 50, CAP, now), Ok(()));
        assert!(list.is_empty(), "admission removes the queue entry");
    }

    #[test]
    fn test_lapsed_entry_falls_to_queue_tail() {
        let mut list = WaitingList::new();
        let now = Instant::now();
        assert_eq!(list.try_admit(id(1), false, 50, 50, CAP, now), Err(1));
        assert_eq!(list.try_admit(id(2), false, 50, 50, CAP, now), Err(2));

        // First applicant misses its window; on return it queues anew.
        let later = now + Duration::from_secs(u64::from(WaitingList::retry_secs(1, CAP)) + 11);
        assert_eq!(list.try_admit(id(1), false, 50, 50, CAP, later), Err(2));
    }

    #[test]
    fn test_retry_time_ramps_and_caps() {
        assert_eq!(WaitingList::retry_secs(1, CAP), 10);
        assert_eq!(WaitingList::retry_secs(2, CAP), 15);
        assert_eq!(WaitingList::retry_secs(23, CAP), 120, "configured cap");
        assert_eq!(WaitingList::retry_secs(100, 1000), 255, "wire byte cap");
    }

    #[test]
    fn test_notice_names_the_slot() {
        assert_eq!(
            WaitingList::notice(3),
            "Too many players online.\nYou are at 3 place on the waiting list."
        );
    }
}
