//! Manual regeneration.

use anyhow::Result;
use tracing::{debug, info};

use crate::common::PostId;
use crate::domains::featured_image::trigger::schedule_generation;
use crate::kernel::{EnqueueResult, ServerDeps};

/// Reset a post's generation state and queue a fresh run.
///
/// Clears status, media reference and timestamp whatever they were, drops
/// any pending run, then schedules a new one.
pub async fn regenerate(post_id: PostId, deps: &ServerDeps) -> Result<EnqueueResult> {
    info!(post_id = %post_id, "Manual regenerate triggered");

    deps.post_store.clear_generation(post_id).await?;

    if deps.queue.unschedule(post_id) {
        debug!(post_id = %post_id, "Dropped pending run before rescheduling");
    }

    Ok(schedule_generation(post_id, deps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MediaRef;
    use crate::domains::featured_image::activities::{generate_featured_image, RunOutcome};
    use crate::domains::featured_image::models::{GenerationStatus, Post};
    use crate::kernel::{BasePostStore, TestDependencies};

    fn published(id: u64) -> Post {
        Post {
            id: PostId(id),
            post_type: "post".into(),
            title: "Today".into(),
            status: "publish".into(),
            content: String::new(),
            categories: vec![],
            author: None,
            featured_image: None,
        }
    }

    #[tokio::test]
    async fn test_regenerate_clears_meta_and_queues_run() {
        let test = TestDependencies::new();
        test.post_store.upsert_post(published(1)).await.unwrap();
        test.post_store
            .mark_generated(PostId(1), &MediaRef::new("old.png"), chrono::Utc::now())
            .await
            .unwrap();

        let result = regenerate(PostId(1), &test.deps()).await.unwrap();

        assert!(result.is_created());
        assert!(test.queue.is_pending(PostId(1)));
        let meta = test.post_store.generation_meta(PostId(1)).await.unwrap();
        assert_eq!(meta.status, GenerationStatus::None);
        assert!(meta.media_ref.is_none());
        assert!(meta.generated_at.is_none());
    }

    #[tokio::test]
    async fn test_regenerate_replaces_pending_entry() {
        let test = TestDependencies::new();
        test.post_store.upsert_post(published(1)).await.unwrap();
        let deps = test.deps();

        assert!(schedule_generation(PostId(1), &deps).is_created());
        assert!(regenerate(PostId(1), &deps).await.unwrap().is_created());
        assert_eq!(test.queue.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_generated_post_runs_again_after_regenerate() {
        let test = TestDependencies::new();
        test.post_store.upsert_post(published(1)).await.unwrap();
        let deps = test.deps();

        let first = generate_featured_image(PostId(1), &deps).await.unwrap();
        assert!(matches!(first, RunOutcome::Generated(_)));

        regenerate(PostId(1), &deps).await.unwrap();
        let second = generate_featured_image(PostId(1), &deps).await.unwrap();
        assert!(matches!(second, RunOutcome::Generated(_)));
        assert_eq!(test.image_generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_regenerate_unknown_post_is_an_error() {
        let test = TestDependencies::new();
        assert!(regenerate(PostId(99), &test.deps()).await.is_err());
        assert!(!test.queue.is_pending(PostId(99)));
    }
}
