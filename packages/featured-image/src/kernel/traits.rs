// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The generation pipeline lives in domain functions that use these traits.
//
// Naming convention: Base* for trait names (e.g., BasePostStore, BaseMediaStore)

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gemini_client::{GeminiError, GeneratedImage};

use crate::common::{MediaRef, PostId};
use crate::domains::featured_image::models::{ClaimOutcome, GenerationMeta, Post};

// =============================================================================
// Post Store Trait (Infrastructure - mirrored posts + generation metadata)
// =============================================================================

#[async_trait]
pub trait BasePostStore: Send + Sync {
    async fn find_post(&self, id: PostId) -> Result<Option<Post>>;

    /// Insert or replace the mirrored post. Generation metadata is untouched.
    async fn upsert_post(&self, post: Post) -> Result<()>;

    /// Metadata for a post; absent metadata reads as the default (`none`).
    async fn generation_meta(&self, id: PostId) -> Result<GenerationMeta>;

    /// Atomically move `none | failed` to `processing`.
    ///
    /// Two concurrent callers for the same post can never both get `Claimed`.
    async fn claim_generation(&self, id: PostId) -> Result<ClaimOutcome>;

    async fn mark_failed(&self, id: PostId) -> Result<()>;

    async fn mark_generated(&self, id: PostId, media: &MediaRef, at: DateTime<Utc>)
        -> Result<()>;

    /// Reset status, media reference and timestamp.
    async fn clear_generation(&self, id: PostId) -> Result<()>;

    /// Replace the post's featured image; `None` removes it.
    async fn set_featured_image(&self, id: PostId, media: Option<&MediaRef>) -> Result<()>;

    /// Whether the operator may edit this post.
    async fn can_edit(&self, operator: &str, id: PostId) -> Result<bool>;
}

// =============================================================================
// Media Store Trait (Infrastructure - image files + catalog)
// =============================================================================

/// A file written by [`BaseMediaStore::write_file`], not yet in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the media root, `/`-separated
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub size: usize,
}

/// Catalog fields for a newly stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub post_id: PostId,
    pub mime_type: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait BaseMediaStore: Send + Sync {
    /// Persist bytes under a unique name derived from `file_name`.
    async fn write_file(
        &self,
        file_name: &str,
        data: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> Result<StoredFile>;

    /// Add a written file to the media catalog, attached to a post.
    async fn register(&self, file: &StoredFile, attachment: NewAttachment) -> Result<MediaRef>;

    /// Delete a written file that never made it into the catalog.
    async fn remove_file(&self, file: &StoredFile) -> Result<()>;
}

// =============================================================================
// Image Generator Trait (Infrastructure - text-to-image provider)
// =============================================================================

#[async_trait]
pub trait BaseImageGenerator: Send + Sync {
    /// Generate one image. The key comes from the settings snapshot of the run.
    async fn generate_image(
        &self,
        api_key: &str,
        prompt: &str,
        model: &str,
        aspect_ratio: &str,
    ) -> std::result::Result<GeneratedImage, GeminiError>;
}
