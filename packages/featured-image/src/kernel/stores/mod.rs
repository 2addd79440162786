pub mod media_store;
pub mod post_store;

pub use media_store::{LocalMediaStore, MediaRecord};
pub use post_store::MemoryPostStore;
