//! Byte-level game protocol: packet cursors, length-prefixed framing, and
//! outbound buffer pooling.

pub mod framing;
pub mod message;
pub mod opcode;
pub mod pool;
pub mod reader;
pub mod writer;

pub use framing::{
    FrameError, MAX_FRAME_SIZE, NEAR_CEILING_MARGIN, near_ceiling, read_frame, write_frame,
};
pub use message::{MessageClass, MessageDetails, SPEAK_MAX_LENGTH};
pub use pool::BufferPool;
pub use reader::{PacketReader, ReadError};
pub use writer::PacketWriter;
