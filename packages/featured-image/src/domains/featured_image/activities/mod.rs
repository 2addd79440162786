//! Featured image activities - the generation pipeline and its steps
//!
//! Called from the generation worker and the HTTP handlers.

pub mod build_prompt;
pub mod extract_links;
pub mod generate;
pub mod publish_media;
pub mod regenerate;

// Re-export for convenience
pub use build_prompt::{build_prompt, select_urls, URLS_PLACEHOLDER};
pub use extract_links::{extract_links, parse_ignored_domains};
pub use generate::{generate_featured_image, GenerationError, RunOutcome, SkipReason};
pub use publish_media::{media_file_name, publish_media, PublishError};
pub use regenerate::regenerate;
