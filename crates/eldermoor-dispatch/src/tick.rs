//! Named periodic events driven by the think tick.
//!
//! The registry itself holds no timer: the game thread runs `due` from its
//! recurring tick task and re-arms the tick afterwards. Re-arming (instead
//! of a fixed-rate timer) means intervals stretch when a run takes long, so
//! runs never overlap.

use std::time::{Duration, Instant};

#[derive(Debug)]
struct PeriodicEvent {
    name: String,
    interval: Duration,
    /// None until the registry ticks for the first time.
    last_run: Option<Instant>,
}

/// Registry of named fixed-interval events.
#[derive(Debug, Default)]
pub struct PeriodicRegistry {
    entries: Vec<PeriodicEvent>,
}

impl PeriodicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event. Returns false (and changes nothing) when the name
    /// is already taken.
    pub fn register(&mut self, name: &str, interval: Duration) -> bool {
        if self.entries.iter().any(|e| e.name == name) {
            return false;
        }
        self.entries.push(PeriodicEvent {
            name: name.to_string(),
            interval,
            last_run: None,
        });
        true
    }

    /// Names of events due at `now`, stamping their last run. An entry seen
    /// for the first time is stamped without firing, so it first fires one
    /// full interval after the registry starts ticking.
    pub fn due(&mut self, now: Instant) -> Vec<String> {
        let mut fired = Vec::new();
        for entry in &mut self.entries {
            match entry.last_run {
                None => entry.last_run = Some(now),
                Some(last) if now.saturating_duration_since(last) >= entry.interval => {
                    entry.last_run = Some(now);
                    fired.push(entry.name.clone());
                }
                Some(_) => {}
            }
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
