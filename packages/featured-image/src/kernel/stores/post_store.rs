//! Post mirror with per-post generation metadata.
//!
//! Everything lives behind one lock so the claim is a true compare-and-swap.
//! With a snapshot path the whole state is rewritten after every mutation,
//! which keeps statuses across restarts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::common::{MediaRef, PostId};
use crate::domains::featured_image::models::{
    ClaimOutcome, GenerationMeta, GenerationStatus, Post,
};
use crate::kernel::BasePostStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPost {
    post: Post,
    #[serde(default)]
    generation: GenerationMeta,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    posts: Vec<StoredPost>,
}

pub struct MemoryPostStore {
    posts: RwLock<BTreeMap<PostId, StoredPost>>,
    snapshot_path: Option<PathBuf>,
    /// Operators that may edit every post
    admins: Vec<String>,
}

impl MemoryPostStore {
    /// Store without persistence.
    pub fn new(admins: Vec<String>) -> Self {
        Self {
            posts: RwLock::new(BTreeMap::new()),
            snapshot_path: None,
            admins,
        }
    }

    /// Store persisted to `path`, loading any existing snapshot.
    pub async fn open(path: impl Into<PathBuf>, admins: Vec<String>) -> Result<Self> {
        let path = path.into();
        let posts = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                snapshot
                    .posts
                    .into_iter()
                    .map(|stored| (stored.post.id, stored))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        debug!(path = %path.display(), posts = posts.len(), "Post store loaded");
        Ok(Self {
            posts: RwLock::new(posts),
            snapshot_path: Some(path),
            admins,
        })
    }

    async fn persist(&self, posts: &BTreeMap<PostId, StoredPost>) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            posts: posts.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Apply `f` to an existing post's entry and persist. The entry is
    /// restored if the snapshot cannot be written.
    async fn update<F>(&self, id: PostId, f: F) -> Result<()>
    where
        F: FnOnce(&mut StoredPost) + Send,
    {
        let mut posts = self.posts.write().await;
        let stored = posts
            .get_mut(&id)
            .with_context(|| format!("Post {} not found", id))?;
        let previous = stored.clone();
        f(stored);

        if let Err(e) = self.persist(&posts).await {
            posts.insert(id, previous);
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl BasePostStore for MemoryPostStore {
    async fn find_post(&self, id: PostId) -> Result<Option<Post>> {
        Ok(self.posts.read().await.get(&id).map(|s| s.post.clone()))
    }

    async fn upsert_post(&self, post: Post) -> Result<()> {
        let mut posts = self.posts.write().await;
        let id = post.id;
        let previous = posts.get(&id).cloned();
        match posts.get_mut(&id) {
            Some(stored) => stored.post = post,
            None => {
                posts.insert(
                    id,
                    StoredPost {
                        post,
                        generation: GenerationMeta::default(),
                    },
                );
            }
        }

        if let Err(e) = self.persist(&posts).await {
            match previous {
                Some(stored) => posts.insert(id, stored),
                None => posts.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn generation_meta(&self, id: PostId) -> Result<GenerationMeta> {
        Ok(self
            .posts
            .read()
            .await
            .get(&id)
            .map(|s| s.generation.clone())
            .unwrap_or_default())
    }

    async fn claim_generation(&self, id: PostId) -> Result<ClaimOutcome> {
        let mut posts = self.posts.write().await;
        let Some(stored) = posts.get_mut(&id) else {
            return Ok(ClaimOutcome::NotFound);
        };

        match stored.generation.status {
            GenerationStatus::Processing => Ok(ClaimOutcome::AlreadyProcessing),
            GenerationStatus::Generated => Ok(ClaimOutcome::AlreadyGenerated),
            previous @ (GenerationStatus::None | GenerationStatus::Failed) => {
                stored.generation.status = GenerationStatus::Processing;
                if let Err(e) = self.persist(&posts).await {
                    if let Some(stored) = posts.get_mut(&id) {
                        stored.generation.status = previous;
                    }
                    return Err(e);
                }
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn mark_failed(&self, id: PostId) -> Result<()> {
        self.update(id, |stored| {
            stored.generation.status = GenerationStatus::Failed;
        })
        .await
    }

    async fn mark_generated(&self, id: PostId, media: &MediaRef, at: DateTime<Utc>) -> Result<()> {
        let media = media.clone();
        self.update(id, move |stored| {
            stored.generation = GenerationMeta::generated(media, at);
        })
        .await
    }

    async fn clear_generation(&self, id: PostId) -> Result<()> {
        self.update(id, |stored| {
            stored.generation = GenerationMeta::default();
        })
        .await
    }

    async fn set_featured_image(&self, id: PostId, media: Option<&MediaRef>) -> Result<()> {
        let media = media.cloned();
        self.update(id, move |stored| {
            stored.post.featured_image = media;
        })
        .await
    }

    async fn can_edit(&self, operator: &str, id: PostId) -> Result<bool> {
        let posts = self.posts.read().await;
        let Some(stored) = posts.get(&id) else {
            return Ok(false);
        };
        Ok(self.admins.iter().any(|admin| admin == operator)
            || stored.post.author.as_deref() == Some(operator))
    }
}
