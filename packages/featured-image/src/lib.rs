// Featured image generation service
//
// Publish events come in over HTTP, eligible posts get a generation run
// queued, and the worker turns the post's outbound links into a prompt,
// an image and a featured image.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::{Config, Settings, SettingsStore};
