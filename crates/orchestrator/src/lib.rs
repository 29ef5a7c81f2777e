//! Concurrent execution engine for batches of command chains.
//!
//! Command lines are grouped into [`SequenceGroup`]s (AND-chains) and run
//! by a [`CommandPool`] under a concurrency budget. Output is either written
//! live or recorded per group and replayed, optionally in submission order.

pub mod error;
pub mod group;
pub mod output;
pub mod pool;
pub mod process;
pub mod recorder;
pub mod verdict;

pub use error::{PoolError, Result};
pub use group::{SequenceGroup, StepState};
pub use output::{OutputSinks, SharedBuffer, Stream};
pub use pool::CommandPool;
pub use process::{send_signal, Destination, ProcessHandle, SignalDelivery};
pub use recorder::OutputRecorder;
pub use verdict::{Decision, LatchReason, Verdict};
