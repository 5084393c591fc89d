//! The game listener: accepts connections and hands them to I/O tasks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use eldermoor_dispatch::TaskSender;
use eldermoor_proto::{GameTask, SessionId};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connection;
use crate::gate::AttemptGate;
use crate::platform::{SocketConfig, configure_stream, create_listener};

/// Atomic generator for monotonically increasing session ids.
struct SessionIds {
    next: AtomicU64,
}

impl SessionIds {
    fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> SessionId {
        SessionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Accept loop for the game port.
///
/// Owns no session state; every accepted connection is throttle-checked,
/// tuned, given a fresh id, and handed to [`connection::spawn_io`]. The
/// game engine hears about it through the task queue like everything else.
pub struct GameServer {
    socket_config: SocketConfig,
    gate: Arc<AttemptGate>,
    tasks: TaskSender<GameTask>,
    ids: SessionIds,
    max_oversized_frames: u32,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GameServer {
    pub fn new(
        gate: Arc<AttemptGate>,
        tasks: TaskSender<GameTask>,
        max_oversized_frames: u32,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            socket_config: SocketConfig::default(),
            gate,
            tasks,
            ids: SessionIds::new(),
            max_oversized_frames,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind the game port and run the accept loop.
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = create_listener(addr, &self.socket_config).await?;
        info!("game server listening on {addr}");
        self.run_with_listener(listener).await
    }

    /// Run the accept loop on a pre-bound listener (used by tests).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = result?;
                    self.accept(stream, peer);
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("game listener shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn accept(&self, stream: TcpStream, peer: SocketAddr) {
        if !self.gate.permit(peer.ip(), Instant::now()) {
            debug!(%peer, "throttled address, dropping connection");
            return;
        }

        if let Err(error) = configure_stream(&stream, &self.socket_config) {
            warn!(%peer, %error, "socket tuning failed");
        }

        let session = self.ids.next_id();
        debug!(?session, %peer, "accepted connection");

        let spawned = connection::spawn_io(
            session,
            stream,
            peer,
            &self.tasks,
            self.max_oversized_frames,
        );
        if spawned.is_err() {
            warn!(?session, "game queue closed, dropping connection");
        }
    }

    /// Ask the accept loop to stop. Running connections are left to the
    /// engine's own teardown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
