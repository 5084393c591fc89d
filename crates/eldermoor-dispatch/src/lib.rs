//! Task handoff between connection I/O and the single game-logic thread.
//!
//! Connection tasks decode bytes in parallel, but everything that touches
//! world state funnels through one queue with one consumer. The queue
//! carries plain task values (no closures), so producers never hold
//! references into game state. A side scheduler provides delayed one-shot
//! tasks with cancellable handles and the re-arming cadence for periodic
//! logic.

pub mod queue;
pub mod scheduler;
pub mod task;
pub mod tick;

pub use queue::{QueueClosed, TaskReceiver, TaskSender, task_channel};
pub use scheduler::{Scheduler, TimerId};
pub use task::{Envelope, TIMED_TASK_EXPIRATION};
pub use tick::PeriodicRegistry;
