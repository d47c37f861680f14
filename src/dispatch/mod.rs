//! Bounded worker pool executing check cycles
//!
//! Idle workers offer a private handoff sender into a shared ready queue.
//! An intake coordinator claims one ready worker per submitted item, so at
//! most `pool_size` items run at once while submission never blocks.

pub mod pool;

pub use pool::{DispatchError, Dispatcher, DispatcherStats, WorkItem, WorkerHandle};
