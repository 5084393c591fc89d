//! Task envelopes.

use std::time::{Duration, Instant};

/// How long a timed task may wait in queue before it is dropped unrun.
pub const TIMED_TASK_EXPIRATION: Duration = Duration::from_millis(2000);

/// A queued task, either run-whenever or stamped with its enqueue time.
///
/// Timed envelopes carry latency-sensitive input (moves, item use, chat):
/// executing one long after the player sent it does more harm than dropping
/// it, so the consumer discards timed envelopes older than the expiration
/// threshold.
#[derive(Debug)]
pub enum Envelope<T> {
    Immediate(T),
    Timed { queued_at: Instant, task: T },
}

impl<T> Envelope<T> {
    pub fn immediate(task: T) -> Self {
        Envelope::Immediate(task)
    }

    /// Stamp `task` with the current time.
    pub fn timed(task: T) -> Self {
        Envelope::Timed {
            queued_at: Instant::now(),
            task,
        }
    }

    /// Whether this envelope should be dropped instead of run.
    pub fn expired(&self, expiration: Duration, now: Instant) -> bool {
        match self {
            Envelope::Immediate(_) => false,
            Envelope::Timed { queued_at, .. } => {
                now.saturating_duration_since(*queued_at) > expiration
            }
        }
    }

    pub fn into_task(self) -> T {
        match self {
            Envelope::Immediate(task) => task,
            Envelope::Timed { task, .. } => task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_never_expires() {
        let env = Envelope::immediate(7u32);
        let later = Instant::now() + Duration::from_secs(3600);
        assert!(!env.expired(TIMED_TASK_EXPIRATION, later));
    }

    #[test]
    fn test_timed_expires_past_threshold() {
        let env = Envelope::timed(7u32);
        let now = Instant::now();
        assert!(!env.expired(TIMED_TASK_EXPIRATION, now));
        assert!(env.expired(
            TIMED_TASK_EXPIRATION,
            now + TIMED_TASK_EXPIRATION + Duration::from_millis(1)
        ));
    }
}
