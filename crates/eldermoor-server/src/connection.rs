//! Per-connection I/O tasks bridging one socket to the game thread.
//!
//! Each accepted stream is split into a reader task and a writer task. The
//! reader turns frames into [`GameTask`]s; the writer drains a channel of
//! encoded batches fed by the session's [`FrameSink`]. Neither task ever
//! touches game state.

use std::net::SocketAddr;

use eldermoor_dispatch::{QueueClosed, TaskSender};
use eldermoor_proto::{
    DecodeError, Decoded, FirstPacket, FrameSink, FrameSizeWatch, GameTask, SessionId, SinkClosed,
    decode, outbound,
};
use eldermoor_wire::{FrameError, PacketReader, PacketWriter, near_ceiling, read_frame, write_frame};
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One instruction for a connection's writer task.
pub enum WriterCommand {
    /// An encoded message batch, sent as one frame.
    Batch(Vec<u8>),
    /// Stop after everything already queued has gone out.
    Close,
}

/// Game-thread handle to one connection's writer task.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl FrameSink for ChannelSink {
    fn deliver(&self, payload: Vec<u8>) -> Result<(), SinkClosed> {
        self.tx
            .send(WriterCommand::Batch(payload))
            .map_err(|_| SinkClosed)
    }

    fn request_close(&self) {
        // Rides the same channel, so pending batches drain first.
        let _ = self.tx.send(WriterCommand::Close);
    }
}

/// The frame sent on accept, before any inbound byte. The nonce and pad
/// bytes are freshly random per connection.
fn greeting_frame() -> Vec<u8> {
    let mut rng = rand::rng();
    let mut greeting = PacketWriter::with_capacity(8);
    outbound::greeting(&mut greeting, rng.random(), rng.random());
    greeting.into_inner()
}

/// Wire up a fresh connection: register the session, queue the greeting,
/// and spawn the reader and writer tasks.
pub fn spawn_io(
    session: SessionId,
    stream: TcpStream,
    peer: SocketAddr,
    tasks: &TaskSender<GameTask>,
    max_oversized_frames: u32,
) -> Result<(), QueueClosed> {
    let (reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();

    // Queued ahead of the session registration, so nothing the engine sends
    // can outrun it.
    let _ = tx.send(WriterCommand::Batch(greeting_frame()));

    tasks.push(GameTask::SessionOpened {
        session,
        peer,
        sink: Box::new(ChannelSink { tx }),
    })?;

    tokio::spawn(write_loop(writer, rx));
    tokio::spawn(read_loop(session, reader, tasks.clone(), max_oversized_frames));
    Ok(())
}

/// Drain the writer channel onto the socket until it closes or a write
/// fails, then shut the write half down.
async fn write_loop<W: AsyncWriteExt + Unpin>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<WriterCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Batch(payload) => {
                if let Err(error) = write_frame(&mut writer, &payload).await {
                    debug!(%error, "write failed, closing connection");
                    break;
                }
            }
            WriterCommand::Close => break,
        }
    }
    let _ = writer.shutdown().await;
}

/// Read frames until the peer goes away or breaks protocol, feeding the
/// game queue. Always reports the disconnect at the end.
async fn read_loop<R: AsyncReadExt + Unpin>(
    session: SessionId,
    mut reader: R,
    tasks: TaskSender<GameTask>,
    max_oversized_frames: u32,
) {
    if read_handshake(session, &mut reader, &tasks).await {
        read_commands(session, &mut reader, &tasks, max_oversized_frames).await;
    }
    let _ = tasks.push(GameTask::Disconnected { session });
}

/// The first frame is the credentials packet; anything malformed ends the
/// connection before it ever becomes a session command.
async fn read_handshake<R: AsyncReadExt + Unpin>(
    session: SessionId,
    reader: &mut R,
    tasks: &TaskSender<GameTask>,
) -> bool {
    let frame = match read_frame(reader).await {
        Ok(frame) => frame,
        Err(FrameError::ConnectionClosed) => return false,
        Err(error) => {
            debug!(?session, %error, "read failed before handshake");
            return false;
        }
    };

    let mut cursor = PacketReader::new(&frame);
    match FirstPacket::decode(&mut cursor) {
        Ok(handshake) => tasks
            .push(GameTask::LoginRequest { session, handshake })
            .is_ok(),
        Err(error) => {
            debug!(?session, %error, "malformed handshake");
            false
        }
    }
}

async fn read_commands<R: AsyncReadExt + Unpin>(
    session: SessionId,
    reader: &mut R,
    tasks: &TaskSender<GameTask>,
    max_oversized_frames: u32,
) {
    let mut watch = FrameSizeWatch::new(max_oversized_frames);

    loop {
        let frame = match read_frame(reader).await {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => return,
            Err(error) => {
                debug!(?session, %error, "read failed");
                return;
            }
        };

        if watch.observe(near_ceiling(frame.len())) {
            warn!(?session, "repeated near-ceiling frames, dropping connection");
            return;
        }

        let Some((&opcode, payload)) = frame.split_first() else {
            debug!(?session, "empty frame");
            return;
        };

        let mut cursor = PacketReader::new(payload);
        match decode(opcode, &mut cursor) {
            Ok(Some(decoded)) => {
                // Latency-sensitive commands expire instead of running late.
                let timed =
                    matches!(&decoded, Decoded::Player(command) if command.deferrable());
                let task = GameTask::Command { session, decoded };
                let queued = if timed {
                    tasks.push_timed(task)
                } else {
                    tasks.push(task)
                };
                if queued.is_err() {
                    return;
                }
            }
            // Parsed but dropped by rule; nothing to queue.
            Ok(None) => {}
            Err(DecodeError::Unknown(opcode)) => {
                if tasks
                    .push(GameTask::UnknownOpcode { session, opcode })
                    .is_err()
                {
                    return;
                }
            }
            Err(error) => {
                debug!(?session, %error, "undecodable frame");
                return;
            }
        }
    }
}
