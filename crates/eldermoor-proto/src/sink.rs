//! Seams between the game thread and the connection side.

use std::net::IpAddr;

/// The connection behind a sink is gone; nothing queued there will be sent.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("connection closed")]
pub struct SinkClosed;

/// Outbound handle for one connection, held by its session record. Payloads
/// are complete encoded message batches; the connection's writer task frames
/// and sends them in order.
pub trait FrameSink: Send {
    fn deliver(&self, payload: Vec<u8>) -> Result<(), SinkClosed>;

    /// Close the connection once pending writes drained.
    fn request_close(&self);
}

/// Feedback to the accept-side attempt throttle.
pub trait LoginGate: Send + Sync {
    /// A login from this address completed; its attempt counter resets.
    fn note_success(&self, peer: IpAddr);
}
