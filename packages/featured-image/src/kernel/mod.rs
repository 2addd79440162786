//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod diagnostic_log;
pub mod jobs;
pub mod nonce;
pub mod stores;
pub mod test_dependencies;
pub mod traits;

pub use deps::{GeminiImageGenerator, ServerDeps};
pub use diagnostic_log::{DiagnosticLayer, DiagnosticLog};
pub use jobs::{EnqueueResult, GenerationQueue, GenerationReceiver, GenerationWorker};
pub use nonce::NonceService;
pub use stores::{LocalMediaStore, MemoryPostStore};
pub use test_dependencies::TestDependencies;
pub use traits::*;
