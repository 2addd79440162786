//! Event payloads and canned post content.

use serde_json::{json, Value};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";

/// Body with three outbound links and one internal link.
pub const NEWS_CONTENT: &str = r#"
<p>Morning roundup.</p>
<a href="https://news.example.com/a">A</a>
<a href="https://www.facebook.com/share">share</a>
<a href="https://other.example.org/b">B</a>
<a href="/internal">internal</a>
<a href="https://news.example.com/a">A again</a>
"#;

/// A draft -> publish transition for a post in the default category.
pub fn publish_event(post_id: u64, author: &str) -> Value {
    json!({
        "old_status": "draft",
        "new_status": "publish",
        "post": {
            "id": post_id,
            "type": "post",
            "title": format!("News {}", post_id),
            "content": NEWS_CONTENT,
            "categories": ["stirile-zilei"],
            "author": author,
        }
    })
}

pub fn transition_event(post_id: u64, old_status: &str, new_status: &str) -> Value {
    let mut event = publish_event(post_id, "alice");
    event["old_status"] = json!(old_status);
    event["new_status"] = json!(new_status);
    event
}
