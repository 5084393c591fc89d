//! Write cursor building one outbound frame payload.
//!
//! Encoders append to the same writer across multiple calls; the connection
//! flushes the accumulated payload as a single frame. Integers go out
//! little-endian, strings with a 16-bit length prefix, matching
//! [`PacketReader`](crate::reader::PacketReader) on the inbound side.

/// Append-only little-endian payload builder.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Reuse a pooled buffer. The buffer is cleared, its allocation kept.
    pub fn from_buffer(mut buf: Vec<u8>) -> Self {
        buf.clear();
        Self { buf }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a 16-bit-length-prefixed string. Payloads the protocol sends
    /// are bounded well under `u16::MAX`; anything longer is truncated at
    /// the prefix limit.
    pub fn put_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.put_u16(len as u16);
        self.buf.extend_from_slice(&bytes[..len]);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append `len` zero bytes (wire padding regions).
    pub fn put_zeros(&mut self, len: usize) {
        self.buf.resize(self.buf.len() + len, 0);
    }

    /// Payload length so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Hand the payload back, e.g. to the frame writer or the pool.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
