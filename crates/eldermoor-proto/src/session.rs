//! Per-connection session records, owned by the engine on the game thread.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use eldermoor_wire::{BufferPool, PacketWriter};
use eldermoor_world::{AccountId, CharacterRecord};
use tracing::debug;

use crate::known::KnownCreatures;
use crate::sink::FrameSink;

/// Connection-scoped identifier handed out by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle position of a session. Removal from the session table is the
/// terminal state; a removed id must never be referenced again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, first frame not yet seen.
    Unauthenticated,
    /// Handshake parsed, gates running.
    LoginPending,
    /// Bound to a creature and receiving world traffic.
    Playing,
    /// Waiting for the delayed rebind after replacing another session.
    ReconnectPending,
    /// Farewell written; the connection is draining.
    Closing,
}

/// Counts consecutive frames that crowd the size ceiling. A client that
/// keeps sending them is cut off.
#[derive(Debug)]
pub struct FrameSizeWatch {
    streak: u32,
    limit: u32,
}

impl FrameSizeWatch {
    pub fn new(limit: u32) -> Self {
        Self { streak: 0, limit }
    }

    /// Track one inbound frame; true once the streak reaches the limit.
    pub fn observe(&mut self, near_ceiling: bool) -> bool {
        if near_ceiling {
            self.streak += 1;
            self.streak >= self.limit
        } else {
            self.streak = 0;
            false
        }
    }
}

/// One connected client as the engine tracks it.
pub struct ClientSession {
    pub id: SessionId,
    pub peer: SocketAddr,
    pub state: SessionState,
    pub sink: Box<dyn FrameSink>,
    /// Pending outbound bytes; encoders append, [`flush`](Self::flush)
    /// hands the batch to the connection.
    pub writer: PacketWriter,
    pub known: KnownCreatures,
    /// Bound creature, set while `Playing`.
    pub creature: Option<u32>,
    pub account: Option<AccountId>,
    pub record: Option<CharacterRecord>,
    /// Restricted pseudo-mode for fresh accounts and namelocked characters.
    pub account_manager: bool,
    pub last_ping: Instant,
    pub last_pong: Instant,
    /// The client-crash report is accepted once per session.
    pub debug_report_taken: bool,
}

impl ClientSession {
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        sink: Box<dyn FrameSink>,
        buffer: Vec<u8>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            peer,
            state: SessionState::Unauthenticated,
            sink,
            writer: PacketWriter::from_buffer(buffer),
            known: KnownCreatures::new(),
            creature: None,
            account: None,
            record: None,
            account_manager: false,
            last_ping: now,
            last_pong: now,
            debug_report_taken: false,
        }
    }

    /// Whether world traffic should reach this session.
    pub fn playing(&self) -> bool {
        self.state == SessionState::Playing && self.creature.is_some()
    }

    /// Hand the pending batch to the connection and re-arm the writer from
    /// the pool. A dead connection is not an error here; its disconnect
    /// notice is already on its way.
    pub fn flush(&mut self, pool: &mut BufferPool) {
        if self.writer.is_empty() {
            return;
        }
        let replacement = PacketWriter::from_buffer(pool.acquire());
        let payload = std::mem::replace(&mut self.writer, replacement).into_inner();
        if self.sink.deliver(payload).is_err() {
            debug!(session = %self.id, "flush into a closed connection");
        }
    }

    /// Give the pending buffer back to the pool at teardown.
    pub fn release_buffer(&mut self, pool: &mut BufferPool) {
        let writer = std::mem::replace(&mut self.writer, PacketWriter::new());
        pool.release(writer.into_inner());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::CaptureSink;

    fn session(sink: Box<dyn FrameSink>) -> ClientSession {
        ClientSession::new(
            SessionId(1),
            "127.0.0.1:7171".parse().expect("socket addr"),
            sink,
            Vec::new(),
            Instant::now(),
        )
    }

    #[test]
    fn test_size_watch_resets_on_normal_frame() {
        let mut watch = FrameSizeWatch::new(3);
        assert!(!watch.observe(true));
        assert!(!watch.observe(true));
        assert!(!watch.observe(false), "normal frame clears the streak");
        assert!(!watch.observe(true));
        assert!(!watch.observe(true));
        assert!(watch.observe(true), "third consecutive hit trips the watch");
    }

    #[test]
    fn test_flush_sends_batch_and_rearms() {
        let (sink, outbox) = CaptureSink::new();
        let mut pool = BufferPool::new(4, 64);
        let mut session = session(Box::new(sink));

        session.flush(&mut pool);
        assert!(outbox.lock().unwrap().is_empty(), "empty writer sends nothing");

        session.writer.put_u8(0xAB);
        session.flush(&mut pool);
        assert_eq!(outbox.lock().unwrap().as_slice(), &[vec![0xAB]]);
        assert!(session.writer.is_empty(), "writer re-armed empty");

        session.writer.put_u8(0xCD);
        session.flush(&mut pool);
        assert_eq!(outbox.lock().unwrap().len(), 2, "batches stay separate");
    }

    #[test]
    fn test_new_session_is_unauthenticated() {
        let (sink, _outbox) = CaptureSink::new();
        let session = session(Box::new(sink));
        assert_eq!(session.state, SessionState::Unauthenticated);
        assert!(!session.playing());
    }
}
