//! In-process generation jobs.
//!
//! A `GenerationQueue` deduplicates scheduled runs by post id and wakes the
//! `GenerationWorker`, which executes each run on its own task.

pub mod queue;
pub mod worker;

pub use queue::{EnqueueResult, GenerationQueue, GenerationReceiver};
pub use worker::GenerationWorker;
