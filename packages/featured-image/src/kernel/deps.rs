//! Server dependencies for activities (using traits for testability)
//!
//! This module provides the central dependency container used by the
//! generation pipeline, the trigger and the HTTP handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gemini_client::{GeminiClient, GeminiError, GeneratedImage};

use crate::config::SettingsStore;
use crate::kernel::jobs::GenerationQueue;
use crate::kernel::{BaseImageGenerator, BaseMediaStore, BasePostStore};

// =============================================================================
// GeminiClient Adapter (implements BaseImageGenerator trait)
// =============================================================================

/// Builds a `GeminiClient` per call so every run uses the key from its own
/// settings snapshot.
pub struct GeminiImageGenerator {
    base_url: String,
    timeout: Duration,
}

impl GeminiImageGenerator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

impl Default for GeminiImageGenerator {
    fn default() -> Self {
        Self::new(gemini_client::DEFAULT_BASE_URL, gemini_client::DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl BaseImageGenerator for GeminiImageGenerator {
    async fn generate_image(
        &self,
        api_key: &str,
        prompt: &str,
        model: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedImage, GeminiError> {
        GeminiClient::new(api_key)
            .with_base_url(self.base_url.clone())
            .with_timeout(self.timeout)
            .generate_image(prompt, model, aspect_ratio)
            .await
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to activities (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub post_store: Arc<dyn BasePostStore>,
    pub media_store: Arc<dyn BaseMediaStore>,
    pub image_generator: Arc<dyn BaseImageGenerator>,
    /// Runtime settings; each run reads one snapshot
    pub settings: Arc<SettingsStore>,
    pub queue: Arc<GenerationQueue>,
}

impl ServerDeps {
    pub fn new(
        post_store: Arc<dyn BasePostStore>,
        media_store: Arc<dyn BaseMediaStore>,
        image_generator: Arc<dyn BaseImageGenerator>,
        settings: Arc<SettingsStore>,
        queue: Arc<GenerationQueue>,
    ) -> Self {
        Self {
            post_store,
            media_store,
            image_generator,
            settings,
            queue,
        }
    }
}
