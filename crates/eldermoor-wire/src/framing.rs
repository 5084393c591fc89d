//! Length-prefixed framing for the game TCP stream.
//!
//! Every message on the wire is a length-prefixed frame:
//!
//! ```text
//! +-------------------+--------------------+
//! | length (2 bytes)  |   payload          |
//! | u16 little-endian |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The 2-byte prefix encodes the payload size, excluding the prefix itself.
//! Payloads above [`MAX_FRAME_SIZE`] are a protocol violation and rejected
//! at the framing layer; payloads within [`NEAR_CEILING_MARGIN`] of the
//! ceiling are legal but counted by the session as an abuse signal.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Hard ceiling on a frame payload, in bytes.
pub const MAX_FRAME_SIZE: usize = 15360;

/// Payloads within this many bytes of [`MAX_FRAME_SIZE`] count as
/// near-ceiling for the session's oversized-frame counter.
pub const NEAR_CEILING_MARGIN: usize = 16;

/// True when a legal payload is close enough to the ceiling to count as an
/// oversized-frame violation.
pub fn near_ceiling(payload_len: usize) -> bool {
    payload_len >= MAX_FRAME_SIZE - NEAR_CEILING_MARGIN
}

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload size exceeds the protocol ceiling.
    #[error("payload size {size} exceeds ceiling {max}")]
    PayloadTooLarge {
        /// The declared or actual payload size.
        size: usize,
        /// The ceiling.
        max: usize,
    },

    /// The connection was closed before a complete frame was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a single length-prefixed frame from the stream.
///
/// Returns the payload bytes. Blocks until the full frame is available.
/// Returns [`FrameError::ConnectionClosed`] if the peer closes the
/// connection before the frame is complete.
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 2];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::ConnectionClosed);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let payload_len = u16::from_le_bytes(len_buf) as usize;
    if payload_len > MAX_FRAME_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                FrameError::ConnectionClosed
            } else {
                FrameError::Io(e)
            }
        })?;
    }

    Ok(payload)
}

/// Write a single length-prefixed frame to the stream.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), FrameError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    writer.write_all(&(payload.len() as u16).to_le_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;

    Ok(())
}
