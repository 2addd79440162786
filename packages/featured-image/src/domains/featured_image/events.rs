//! Inbound events from the publishing system.

use serde::{Deserialize, Serialize};

use super::models::Post;
use crate::common::PostId;

/// A post moved from one status to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostStatusTransition {
    pub old_status: String,
    pub new_status: String,
    pub post: PostSnapshot,
}

/// Post fields carried by a transition event.
///
/// Optional fields left out of the event keep whatever the mirror already had.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSnapshot {
    pub id: PostId,
    #[serde(rename = "type")]
    pub post_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub author: Option<String>,
}

impl PostStatusTransition {
    pub fn is_publish_transition(&self) -> bool {
        self.new_status == super::models::PUBLISHED_STATUS
            && self.old_status != super::models::PUBLISHED_STATUS
    }

    /// Merge the event into the mirrored post (or start a new one).
    pub fn apply_to(&self, existing: Option<Post>) -> Post {
        let snapshot = &self.post;
        let mut post = existing.unwrap_or_else(|| Post {
            id: snapshot.id,
            post_type: snapshot.post_type.clone(),
            title: String::new(),
            status: String::new(),
            content: String::new(),
            categories: Vec::new(),
            author: None,
            featured_image: None,
        });

        post.post_type = snapshot.post_type.clone();
        post.title = snapshot.title.clone();
        post.status = self.new_status.clone();
        if let Some(content) = &snapshot.content {
            post.content = content.clone();
        }
        if let Some(categories) = &snapshot.categories {
            post.categories = categories.clone();
        }
        if snapshot.author.is_some() {
            post.author = snapshot.author.clone();
        }
        post
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(old: &str, new: &str) -> PostStatusTransition {
        serde_json::from_value(serde_json::json!({
            "old_status": old,
            "new_status": new,
            "post": {"id": 7, "type": "post", "title": "Today"}
        }))
        .unwrap()
    }

    #[test]
    fn test_publish_transition_requires_status_change() {
        assert!(event("draft", "publish").is_publish_transition());
        assert!(event("future", "publish").is_publish_transition());
        assert!(!event("publish", "publish").is_publish_transition());
        assert!(!event("draft", "pending").is_publish_transition());
    }

    #[test]
    fn test_apply_keeps_fields_missing_from_event() {
        let existing = Post {
            id: PostId(7),
            post_type: "post".into(),
            title: "Old".into(),
            status: "draft".into(),
            content: "<a href=\"https://a.com\">a</a>".into(),
            categories: vec!["stirile-zilei".into()],
            author: Some("alice".into()),
            featured_image: None,
        };

        let post = event("draft", "publish").apply_to(Some(existing));

        assert_eq!(post.title, "Today");
        assert_eq!(post.status, "publish");
        assert_eq!(post.categories, vec!["stirile-zilei".to_string()]);
        assert_eq!(post.author.as_deref(), Some("alice"));
        assert!(post.content.contains("a.com"));
    }
}
