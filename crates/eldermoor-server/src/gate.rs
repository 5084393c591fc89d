//! Per-address connection throttle, consulted before the greeting.
//!
//! Each accept charges the peer address one attempt inside a rolling window;
//! going over the limit throttles the address for a while and its
//! connections are dropped without a byte sent. A completed login clears the
//! address, so a shared NAT full of well-behaved clients never builds up a
//! streak.

use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use eldermoor_config::Config;
use eldermoor_proto::LoginGate;
use rustc_hash::FxHashMap;
use tracing::debug;

struct AttemptWindow {
    window_start: Instant,
    attempts: u32,
    throttled_until: Option<Instant>,
}

/// Accept-side attempt tracker keyed by peer address.
pub struct AttemptGate {
    limit: u32,
    window: Duration,
    throttle: Duration,
    inner: Mutex<FxHashMap<IpAddr, AttemptWindow>>,
}

impl AttemptGate {
    pub fn new(limit: u32, window: Duration, throttle: Duration) -> Self {
        Self {
            limit,
            window,
            throttle,
            inner: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.server.attempt_limit,
            Duration::from_millis(config.server.attempt_window_ms),
            Duration::from_millis(config.server.throttle_ms),
        )
    }

    /// Charge one attempt to `peer`. False means the connection is to be
    /// dropped on the floor.
    pub fn permit(&self, peer: IpAddr, now: Instant) -> bool {
        let mut map = self.inner.lock().unwrap();
        let entry = map.entry(peer).or_insert(AttemptWindow {
            window_start: now,
            attempts: 0,
            throttled_until: None,
        });

        if let Some(until) = entry.throttled_until {
            if now < until {
                return false;
            }
            entry.throttled_until = None;
            entry.attempts = 0;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) > self.window {
            entry.window_start = now;
            entry.attempts = 0;
        }

        entry.attempts += 1;
        if entry.attempts > self.limit {
            entry.throttled_until = Some(now + self.throttle);
            debug!(%peer, attempts = entry.attempts, "address throttled");
            return false;
        }
        true
    }
}

impl LoginGate for AttemptGate {
    fn note_success(&self, peer: IpAddr) {
        self.inner.lock().unwrap().remove(&peer);
    }
}
