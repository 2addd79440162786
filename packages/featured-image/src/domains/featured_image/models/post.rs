use serde::{Deserialize, Serialize};

use crate::common::{MediaRef, PostId};

/// Status string of a published post
pub const PUBLISHED_STATUS: &str = "publish";

/// The only post type that gets generated artwork
pub const ELIGIBLE_POST_TYPE: &str = "post";

/// Mirror of a post in the publishing system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub post_type: String, // 'post', 'page', ...
    pub title: String,
    pub status: String, // 'draft', 'future', 'publish', ...
    /// Post body (HTML)
    #[serde(default)]
    pub content: String,
    /// Category slugs
    #[serde(default)]
    pub categories: Vec<String>,
    /// Operator who owns the post
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub featured_image: Option<MediaRef>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PUBLISHED_STATUS
    }

    pub fn in_category(&self, slug: &str) -> bool {
        !slug.is_empty() && self.categories.iter().any(|c| c == slug)
    }
}
