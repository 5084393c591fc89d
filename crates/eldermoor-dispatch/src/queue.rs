//! The game-logic task queue: many producers, one consumer.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use tracing::debug;

use crate::task::Envelope;

/// Every consumer handle is gone; the task was not queued.
#[derive(Debug, thiserror::Error)]
#[error("task queue closed")]
pub struct QueueClosed;

/// Producer handle, cloned into every connection task and the scheduler.
#[derive(Debug)]
pub struct TaskSender<T> {
    tx: Sender<Envelope<T>>,
}

// Manual impl: `T` itself need not be Clone for the handle to be.
impl<T> Clone for TaskSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> TaskSender<T> {
    /// Queue a task that runs whenever it is dequeued.
    pub fn push(&self, task: T) -> Result<(), QueueClosed> {
        self.tx.send(Envelope::immediate(task)).map_err(|_| QueueClosed)
    }

    /// Queue a task that is dropped if it waits longer than the receiver's
    /// expiration threshold.
    pub fn push_timed(&self, task: T) -> Result<(), QueueClosed> {
        self.tx.send(Envelope::timed(task)).map_err(|_| QueueClosed)
    }
}

/// Consumer handle, owned by the game-logic thread.
#[derive(Debug)]
pub struct TaskReceiver<T> {
    rx: Receiver<Envelope<T>>,
    expiration: Duration,
    dropped_stale: u64,
}

impl<T> TaskReceiver<T> {
    /// Block for the next runnable task, discarding stale timed ones.
    /// `None` once every sender is gone and the queue drained.
    pub fn recv(&mut self) -> Option<T> {
        loop {
            let envelope = self.rx.recv().ok()?;
            if self.discard_if_stale(&envelope) {
                continue;
            }
            return Some(envelope.into_task());
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            let envelope = match self.rx.try_recv() {
                Ok(envelope) => envelope,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            };
            if self.discard_if_stale(&envelope) {
                continue;
            }
            return Some(envelope.into_task());
        }
    }

    fn discard_if_stale(&mut self, envelope: &Envelope<T>) -> bool {
        if envelope.expired(self.expiration, Instant::now()) {
            self.dropped_stale += 1;
            debug!(total = self.dropped_stale, "dropped stale timed task");
            return true;
        }
        false
    }

    /// Timed tasks dropped unrun so far.
    pub fn dropped_stale(&self) -> u64 {
        self.dropped_stale
    }
}

/// Build the queue with the given timed-task expiration threshold.
pub fn task_channel<T>(expiration: Duration) -> (TaskSender<T>, TaskReceiver<T>) {
    let (tx, rx) = unbounded();
    (
        TaskSender { tx },
        TaskReceiver {
            rx,
            expiration,
            dropped_stale: 0,
        },
    )
}
