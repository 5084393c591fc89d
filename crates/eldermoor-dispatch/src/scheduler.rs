//! Delayed one-shot tasks.
//!
//! A dedicated timer thread keeps a deadline heap and forwards each task
//! into the game queue when its delay elapses. Handles cancel
//! cooperatively: cancelling prevents a not-yet-fired task from being
//! forwarded, but a task already moved into the game queue runs; consumers
//! that care re-validate against their stored handle.

use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{Builder, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use tracing::{debug, warn};

use crate::queue::TaskSender;

/// Handle to one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

enum Control<T> {
    Schedule {
        id: u64,
        fire_at: Instant,
        task: T,
    },
    Cancel(u64),
    Shutdown,
}

struct Entry<T> {
    fire_at: Instant,
    /// Tie-break so equal deadlines fire in schedule order.
    seq: u64,
    id: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // BinaryHeap is a max-heap; reverse so the earliest deadline surfaces.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .fire_at
            .cmp(&self.fire_at)
            .then(other.seq.cmp(&self.seq))
    }
}

/// The timer thread plus its control handle.
#[derive(Debug)]
pub struct Scheduler<T> {
    control: Sender<Control<T>>,
    next_id: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Scheduler<T> {
    /// Start the timer thread; fired tasks go into `out` as immediate
    /// envelopes.
    pub fn spawn(out: TaskSender<T>) -> std::io::Result<Self> {
        let (control, control_rx) = unbounded();
        let thread = Builder::new()
            .name("timer".into())
            .spawn(move || run_timer(control_rx, out))?;
        Ok(Self {
            control,
            next_id: Arc::new(AtomicU64::new(1)),
            thread: Some(thread),
        })
    }

    /// Fire `task` once after `delay`.
    pub fn schedule(&self, delay: Duration, task: T) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fire_at = Instant::now() + delay;
        if self
            .control
            .send(Control::Schedule { id, fire_at, task })
            .is_err()
        {
            warn!("timer thread gone, task will never fire");
        }
        TimerId(id)
    }

    /// Best-effort cancel; a no-op once the task reached the game queue.
    pub fn cancel(&self, id: TimerId) {
        let _ = self.control.send(Control::Cancel(id.0));
    }
}

impl<T> Drop for Scheduler<T> {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_timer<T>(control: crossbeam_channel::Receiver<Control<T>>, out: TaskSender<T>) {
    let mut heap: BinaryHeap<Entry<T>> = BinaryHeap::new();
    let mut cancelled: HashSet<u64> = HashSet::new();
    let mut seq: u64 = 0;

    loop {
        let wait = match heap.peek() {
            Some(entry) => entry.fire_at.saturating_duration_since(Instant::now()),
            None => Duration::from_secs(60),
        };

        match control.recv_timeout(wait) {
            Ok(Control::Schedule { id, fire_at, task }) => {
                heap.push(Entry {
                    fire_at,
                    seq,
                    id,
                    task,
                });
                seq += 1;
            }
            Ok(Control::Cancel(id)) => {
                cancelled.insert(id);
            }
            Ok(Control::Shutdown) => return,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        let now = Instant::now();
        while heap.peek().is_some_and(|entry| entry.fire_at <= now) {
            let Some(entry) = heap.pop() else { break };
            if cancelled.remove(&entry.id) {
                debug!(id = entry.id, "scheduled task cancelled before firing");
                continue;
            }
            if out.push(entry.task).is_err() {
                // Game thread is gone; nothing left to fire for.
                return;
            }
        }

        // Cancels for ids that already fired would otherwise pile up.
        if heap.is_empty() {
            cancelled.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::task_channel;

    #[test]
    fn test_task_fires_after_delay() {
        let (tx, mut rx) = task_channel::<&str>(Duration::from_secs(5));
        let scheduler = Scheduler::spawn(tx).unwrap();

        let started = Instant::now();
        scheduler.schedule(Duration::from_millis(30), "fired");

        assert_eq!(rx.recv(), Some("fired"));
        assert!(
            started.elapsed() >= Duration::from_millis(30),
            "task must not fire early"
        );
    }

    #[test]
    fn test_cancel_prevents_fire() {
        let (tx, mut rx) = task_channel::<&str>(Duration::from_secs(5));
        let scheduler = Scheduler::spawn(tx).unwrap();

        let id = scheduler.schedule(Duration::from_millis(50), "cancelled");
        scheduler.cancel(id);
        scheduler.schedule(Duration::from_millis(80), "kept");

        assert_eq!(rx.recv(), Some("kept"), "cancelled task must not fire");
    }

    #[test]
    fn test_equal_deadlines_fire_in_schedule_order() {
        let (tx, mut rx) = task_channel::<u32>(Duration::from_secs(5));
        let scheduler = Scheduler::spawn(tx).unwrap();

        let fire = Duration::from_millis(40);
        scheduler.schedule(fire, 1);
        scheduler.schedule(fire, 2);
        scheduler.schedule(fire, 3);

        assert_eq!(rx.recv(), Some(1));
        assert_eq!(rx.recv(), Some(2));
        assert_eq!(rx.recv(), Some(3));
    }

    #[test]
    fn test_cancel_unknown_id_is_harmless() {
        let (tx, mut rx) = task_channel::<&str>(Duration::from_secs(5));
        let scheduler = Scheduler::spawn(tx).unwrap();
        scheduler.cancel(TimerId(9999));
        scheduler.schedule(Duration::from_millis(10), "still works");
        assert_eq!(rx.recv(), Some("still works"));
    }
}
