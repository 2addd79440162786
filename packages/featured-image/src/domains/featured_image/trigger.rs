//! Publish-event trigger.
//!
//! Decides whether a status transition should produce a generation run and,
//! if so, queues one. Never waits on the run itself.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use super::events::PostStatusTransition;
use super::models::ELIGIBLE_POST_TYPE;
use crate::common::PostId;
use crate::kernel::{EnqueueResult, ServerDeps};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDecision {
    Scheduled,
    /// Eligible, but a run was already pending
    AlreadyPending,
    /// Not a transition into `publish`
    SkippedStatus,
    SkippedPostType,
    SkippedCategory,
    SkippedNoApiKey,
}

/// Mirror the event's post, then schedule a run if it qualifies.
///
/// Qualifies when it moves into `publish` from another status, is a
/// standard post, sits in the configured category and an API key is set.
pub async fn on_status_transition(
    event: &PostStatusTransition,
    deps: &ServerDeps,
) -> Result<TriggerDecision> {
    let post_id = event.post.id;
    info!(
        post_id = %post_id,
        post_type = %event.post.post_type,
        old_status = %event.old_status,
        new_status = %event.new_status,
        title = %event.post.title,
        "Post status transition"
    );

    let existing = deps.post_store.find_post(post_id).await?;
    let post = event.apply_to(existing);
    deps.post_store.upsert_post(post.clone()).await?;

    if !event.is_publish_transition() {
        info!(
            post_id = %post_id,
            "Skipped: status transition {} -> {} (need non-publish -> publish)",
            event.old_status,
            event.new_status
        );
        return Ok(TriggerDecision::SkippedStatus);
    }

    if post.post_type != ELIGIBLE_POST_TYPE {
        info!(post_id = %post_id, post_type = %post.post_type, "Skipped: not a standard post");
        return Ok(TriggerDecision::SkippedPostType);
    }

    let settings = deps.settings.snapshot();
    info!(
        post_id = %post_id,
        category = %settings.category,
        post_categories = ?post.categories,
        "Category check"
    );
    if !post.in_category(&settings.category) {
        info!(post_id = %post_id, category = %settings.category, "Skipped: not in category");
        return Ok(TriggerDecision::SkippedCategory);
    }

    if !settings.has_api_key() {
        info!(post_id = %post_id, "Skipped: no API key configured");
        return Ok(TriggerDecision::SkippedNoApiKey);
    }

    Ok(match schedule_generation(post_id, deps) {
        EnqueueResult::Created(_) => TriggerDecision::Scheduled,
        EnqueueResult::Duplicate(_) => TriggerDecision::AlreadyPending,
    })
}

/// Queue a run (deduplicated by post) and wake the worker.
pub fn schedule_generation(post_id: PostId, deps: &ServerDeps) -> EnqueueResult {
    let result = deps.queue.schedule(post_id);
    match result {
        EnqueueResult::Created(_) => info!(post_id = %post_id, "Generation scheduled"),
        EnqueueResult::Duplicate(_) => info!(post_id = %post_id, "Generation already scheduled"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::featured_image::events::PostSnapshot;
    use crate::kernel::{BasePostStore, TestDependencies};

    fn transition(old: &str, new: &str, post_type: &str, categories: &[&str]) -> PostStatusTransition {
        PostStatusTransition {
            old_status: old.into(),
            new_status: new.into(),
            post: PostSnapshot {
                id: PostId(10),
                post_type: post_type.into(),
                title: "Știrile zilei".into(),
                content: Some(r#"<a href="https://a.com">a</a>"#.into()),
                categories: Some(categories.iter().map(|c| c.to_string()).collect()),
                author: Some("alice".into()),
            },
        }
    }

    #[tokio::test]
    async fn test_new_publish_in_category_is_scheduled() {
        let test = TestDependencies::new();
        let decision = on_status_transition(
            &transition("draft", "publish", "post", &["stirile-zilei"]),
            &test.deps(),
        )
        .await
        .unwrap();

        assert_eq!(decision, TriggerDecision::Scheduled);
        assert!(test.queue.is_pending(PostId(10)));
        let post = test.post_store.find_post(PostId(10)).await.unwrap().unwrap();
        assert_eq!(post.status, "publish");
    }

    #[tokio::test]
    async fn test_republish_is_ignored() {
        let test = TestDependencies::new();
        let decision = on_status_transition(
            &transition("publish", "publish", "post", &["stirile-zilei"]),
            &test.deps(),
        )
        .await
        .unwrap();

        assert_eq!(decision, TriggerDecision::SkippedStatus);
        assert!(!test.queue.is_pending(PostId(10)));
    }

    #[tokio::test]
    async fn test_pages_are_ignored() {
        let test = TestDependencies::new();
        let decision = on_status_transition(
            &transition("draft", "publish", "page", &["stirile-zilei"]),
            &test.deps(),
        )
        .await
        .unwrap();
        assert_eq!(decision, TriggerDecision::SkippedPostType);
    }

    #[tokio::test]
    async fn test_other_categories_are_ignored() {
        let test = TestDependencies::new();
        let decision = on_status_transition(
            &transition("draft", "publish", "post", &["sport"]),
            &test.deps(),
        )
        .await
        .unwrap();
        assert_eq!(decision, TriggerDecision::SkippedCategory);
    }

    #[tokio::test]
    async fn test_blank_category_setting_matches_nothing() {
        let test = TestDependencies::new().with_setting("category", "");
        let decision = on_status_transition(
            &transition("draft", "publish", "post", &[""]),
            &test.deps(),
        )
        .await
        .unwrap();
        assert_eq!(decision, TriggerDecision::SkippedCategory);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_ignored() {
        let test = TestDependencies::new().with_setting("api_key", "  ");
        let decision = on_status_transition(
            &transition("draft", "publish", "post", &["stirile-zilei"]),
            &test.deps(),
        )
        .await
        .unwrap();
        assert_eq!(decision, TriggerDecision::SkippedNoApiKey);
    }

    #[tokio::test]
    async fn test_second_event_while_pending_is_deduplicated() {
        let test = TestDependencies::new();
        let deps = test.deps();
        let event = transition("draft", "publish", "post", &["stirile-zilei"]);

        assert_eq!(
            on_status_transition(&event, &deps).await.unwrap(),
            TriggerDecision::Scheduled
        );
        assert_eq!(
            on_status_transition(&event, &deps).await.unwrap(),
            TriggerDecision::AlreadyPending
        );
        assert_eq!(test.queue.pending_count(), 1);
    }
}
