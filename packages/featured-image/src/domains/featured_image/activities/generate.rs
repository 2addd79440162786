//! Generation run for one post.
//!
//! ```text
//! find post (must be published)
//!     └─► claim: none|failed -> processing   (atomic, else skip)
//!           └─► settings snapshot
//!                 └─► extract links -> select -> prompt
//!                       └─► generate image -> publish media
//!                             └─► set featured image -> generated
//! ```
//!
//! Any error after the claim marks the post `failed`. Nothing is retried;
//! a manual regenerate is the only way back.

use chrono::Utc;
use gemini_client::GeminiError;
use tracing::{error, info, warn};

use super::build_prompt::{build_prompt, select_urls};
use super::extract_links::{extract_links, parse_ignored_domains};
use super::publish_media::{publish_media, PublishError};
use crate::common::{MediaRef, PostId};
use crate::config::Settings;
use crate::domains::featured_image::models::{ClaimOutcome, Post};
use crate::kernel::ServerDeps;

/// Characters of the prompt shown in the log.
const PROMPT_PREVIEW_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error(transparent)]
    Image(#[from] GeminiError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("post store error: {0:#}")]
    Store(anyhow::Error),
}

/// Why a run did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    PostNotFound,
    NotPublished(String),
    AlreadyProcessing,
    AlreadyGenerated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Generated(MediaRef),
    /// The post was marked `failed`; carries the error text
    Failed(String),
    Skipped(SkipReason),
}

/// Run the pipeline for a post.
///
/// Errors are only returned when the store itself cannot be read or claimed;
/// pipeline failures come back as `RunOutcome::Failed`.
pub async fn generate_featured_image(
    post_id: PostId,
    deps: &ServerDeps,
) -> anyhow::Result<RunOutcome> {
    info!(post_id = %post_id, "Generation run started");

    let post = match deps.post_store.find_post(post_id).await? {
        Some(post) if post.is_published() => post,
        Some(post) => {
            warn!(post_id = %post_id, status = %post.status, "Aborted: post is not published");
            return Ok(RunOutcome::Skipped(SkipReason::NotPublished(post.status)));
        }
        None => {
            warn!(post_id = %post_id, "Aborted: post not found");
            return Ok(RunOutcome::Skipped(SkipReason::PostNotFound));
        }
    };

    let skip = match deps.post_store.claim_generation(post_id).await? {
        ClaimOutcome::Claimed => None,
        ClaimOutcome::AlreadyProcessing => Some(SkipReason::AlreadyProcessing),
        ClaimOutcome::AlreadyGenerated => Some(SkipReason::AlreadyGenerated),
        ClaimOutcome::NotFound => Some(SkipReason::PostNotFound),
    };
    if let Some(reason) = skip {
        info!(post_id = %post_id, reason = ?reason, "Aborted: duplicate run");
        return Ok(RunOutcome::Skipped(reason));
    }
    info!(post_id = %post_id, "Status set to processing");

    let settings = deps.settings.snapshot();
    match run_pipeline(&post, &settings, deps).await {
        Ok(media_ref) => {
            info!(post_id = %post_id, media_ref = %media_ref, "Generation run succeeded");
            Ok(RunOutcome::Generated(media_ref))
        }
        Err(e) => {
            error!(post_id = %post_id, error = %e, "Generation run failed");
            if let Err(store_err) = deps.post_store.mark_failed(post_id).await {
                error!(post_id = %post_id, error = %store_err, "Could not record failed status");
            }
            Ok(RunOutcome::Failed(e.to_string()))
        }
    }
}

async fn run_pipeline(
    post: &Post,
    settings: &Settings,
    deps: &ServerDeps,
) -> Result<MediaRef, GenerationError> {
    if !settings.has_api_key() {
        return Err(GenerationError::MissingApiKey);
    }
    let started_at = Utc::now();

    let ignored = parse_ignored_domains(&settings.ignored_domains);
    info!(
        post_id = %post.id,
        content_length = post.content.len(),
        ignored = ?ignored,
        "Extracting links"
    );
    let urls = extract_links(&post.content, &ignored);
    info!(count = urls.len(), urls = ?urls, "Links extracted");

    let urls = select_urls(
        urls,
        settings.max_urls,
        settings.randomize_urls,
        &mut fastrand::Rng::new(),
    );
    let prompt = build_prompt(&settings.prompt, &urls);
    info!(
        selected = ?urls,
        chars = prompt.chars().count(),
        preview = %prompt.chars().take(PROMPT_PREVIEW_CHARS).collect::<String>(),
        "Prompt built"
    );

    info!(
        model = %settings.model,
        aspect_ratio = %settings.aspect_ratio,
        "Requesting image"
    );
    let image = deps
        .image_generator
        .generate_image(
            settings.api_key.expose(),
            &prompt,
            &settings.model,
            &settings.aspect_ratio,
        )
        .await?;
    info!(mime_type = %image.mime_type, bytes = image.data.len(), "Image received");

    let media_ref = publish_media(
        post.id,
        &image,
        settings.filename_template(),
        started_at,
        deps.media_store.as_ref(),
    )
    .await?;

    deps.post_store
        .set_featured_image(post.id, Some(&media_ref))
        .await
        .map_err(GenerationError::Store)?;
    info!(post_id = %post.id, media_ref = %media_ref, "Featured image set");

    if let Err(e) = deps
        .post_store
        .mark_generated(post.id, &media_ref, Utc::now())
        .await
    {
        // A failed run must not leave the new image in place
        if let Err(restore_err) = deps
            .post_store
            .set_featured_image(post.id, post.featured_image.as_ref())
            .await
        {
            error!(post_id = %post.id, error = %restore_err, "Could not restore featured image");
        }
        return Err(GenerationError::Store(e));
    }

    Ok(media_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::DateTime;

    use crate::domains::featured_image::models::{GenerationMeta, GenerationStatus};
    use crate::kernel::test_dependencies::{MockImageGenerator, MockMediaStore};
    use crate::kernel::{BasePostStore, MemoryPostStore, TestDependencies};

    fn published(id: u64, content: &str) -> Post {
        Post {
            id: PostId(id),
            post_type: "post".into(),
            title: "Today".into(),
            status: "publish".into(),
            content: content.into(),
            categories: vec!["stirile-zilei".into()],
            author: None,
            featured_image: None,
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_any_call() {
        let test = TestDependencies::new().with_setting("api_key", "");
        test.post_store.upsert_post(published(1, "")).await.unwrap();

        let outcome = generate_featured_image(PostId(1), &test.deps()).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Failed(_)));
        assert_eq!(test.image_generator.call_count(), 0);
        let meta = test.post_store.generation_meta(PostId(1)).await.unwrap();
        assert_eq!(meta.status, GenerationStatus::Failed);
    }

    #[tokio::test]
    async fn test_unpublished_post_is_skipped_without_claim() {
        let test = TestDependencies::new();
        let mut post = published(1, "");
        post.status = "draft".into();
        test.post_store.upsert_post(post).await.unwrap();

        let outcome = generate_featured_image(PostId(1), &test.deps()).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Skipped(SkipReason::NotPublished("draft".into()))
        );
        let meta = test.post_store.generation_meta(PostId(1)).await.unwrap();
        assert_eq!(meta.status, GenerationStatus::None);
    }

    #[tokio::test]
    async fn test_generated_post_is_not_reprocessed() {
        let test = TestDependencies::new();
        test.post_store.upsert_post(published(1, "")).await.unwrap();
        let deps = test.deps();

        let first = generate_featured_image(PostId(1), &deps).await.unwrap();
        assert!(matches!(first, RunOutcome::Generated(_)));

        let second = generate_featured_image(PostId(1), &deps).await.unwrap();
        assert_eq!(second, RunOutcome::Skipped(SkipReason::AlreadyGenerated));
        assert_eq!(test.image_generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_image_error_marks_failed_and_keeps_featured_image() {
        let test = TestDependencies::new()
            .with_image_generator(MockImageGenerator::new().with_error(GeminiError::NoImage));
        test.post_store.upsert_post(published(1, "")).await.unwrap();

        let outcome = generate_featured_image(PostId(1), &test.deps()).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Failed(_)));
        let post = test.post_store.find_post(PostId(1)).await.unwrap().unwrap();
        assert!(post.featured_image.is_none());
        assert!(test.media_store.writes().is_empty());
        let meta = test.post_store.generation_meta(PostId(1)).await.unwrap();
        assert_eq!(meta.status, GenerationStatus::Failed);
        assert!(meta.media_ref.is_none());
    }

    #[tokio::test]
    async fn test_publish_error_marks_failed() {
        let test = TestDependencies::new().with_media_store(MockMediaStore::failing_register());
        test.post_store.upsert_post(published(1, "")).await.unwrap();

        let outcome = generate_featured_image(PostId(1), &test.deps()).await.unwrap();

        match outcome {
            RunOutcome::Failed(message) => assert!(message.contains("register")),
            other => panic!("expected failure, got {:?}", other),
        }
        let meta = test.post_store.generation_meta(PostId(1)).await.unwrap();
        assert_eq!(meta.status, GenerationStatus::Failed);
    }

    /// Delegates to a `MemoryPostStore` but cannot record a generated status.
    struct GeneratedWriteFails(Arc<MemoryPostStore>);

    #[async_trait]
    impl BasePostStore for GeneratedWriteFails {
        async fn find_post(&self, id: PostId) -> anyhow::Result<Option<Post>> {
            self.0.find_post(id).await
        }
        async fn upsert_post(&self, post: Post) -> anyhow::Result<()> {
            self.0.upsert_post(post).await
        }
        async fn generation_meta(&self, id: PostId) -> anyhow::Result<GenerationMeta> {
            self.0.generation_meta(id).await
        }
        async fn claim_generation(&self, id: PostId) -> anyhow::Result<ClaimOutcome> {
            self.0.claim_generation(id).await
        }
        async fn mark_failed(&self, id: PostId) -> anyhow::Result<()> {
            self.0.mark_failed(id).await
        }
        async fn mark_generated(
            &self,
            _id: PostId,
            _media: &MediaRef,
            _at: DateTime<Utc>,
        ) -> anyhow::Result<()> {
            anyhow::bail!("snapshot not writable")
        }
        async fn clear_generation(&self, id: PostId) -> anyhow::Result<()> {
            self.0.clear_generation(id).await
        }
        async fn set_featured_image(
            &self,
            id: PostId,
            media: Option<&MediaRef>,
        ) -> anyhow::Result<()> {
            self.0.set_featured_image(id, media).await
        }
        async fn can_edit(&self, operator: &str, id: PostId) -> anyhow::Result<bool> {
            self.0.can_edit(operator, id).await
        }
    }

    #[tokio::test]
    async fn test_failed_status_write_restores_featured_image() {
        let test = TestDependencies::new();
        let mut post = published(1, "");
        post.featured_image = Some(MediaRef::new("2024/12/previous.png"));
        test.post_store.upsert_post(post).await.unwrap();

        let mut deps = test.deps();
        deps.post_store = Arc::new(GeneratedWriteFails(test.post_store.clone()));

        let outcome = generate_featured_image(PostId(1), &deps).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Failed(_)));
        let post = test.post_store.find_post(PostId(1)).await.unwrap().unwrap();
        assert_eq!(
            post.featured_image,
            Some(MediaRef::new("2024/12/previous.png"))
        );
        let meta = test.post_store.generation_meta(PostId(1)).await.unwrap();
        assert_eq!(meta.status, GenerationStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_post_can_be_claimed_again() {
        let test = TestDependencies::new().with_image_generator(
            MockImageGenerator::new().with_error(GeminiError::Transport("reset".into())),
        );
        test.post_store.upsert_post(published(1, "")).await.unwrap();
        let deps = test.deps();

        let first = generate_featured_image(PostId(1), &deps).await.unwrap();
        assert!(matches!(first, RunOutcome::Failed(_)));

        let second = generate_featured_image(PostId(1), &deps).await.unwrap();
        assert!(matches!(second, RunOutcome::Generated(_)));
    }

    #[tokio::test]
    async fn test_settings_flow_into_request() {
        let test = TestDependencies::new()
            .with_setting("prompt", "links: {urls}")
            .with_setting("model", "custom-model")
            .with_setting("aspect_ratio", "1:1")
            .with_setting("max_urls", "1");
        let content = r#"<a href="https://a.com/1">a</a><a href="https://b.com/2">b</a>"#;
        test.post_store.upsert_post(published(1, content)).await.unwrap();

        generate_featured_image(PostId(1), &test.deps()).await.unwrap();

        let calls = test.image_generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "links: https://a.com/1");
        assert_eq!(calls[0].model, "custom-model");
        assert_eq!(calls[0].aspect_ratio, "1:1");
        assert_eq!(calls[0].api_key, "test-key");
    }
}
