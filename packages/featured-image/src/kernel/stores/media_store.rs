//! Filesystem media library.
//!
//! Files land in `<root>/<YYYY>/<MM>/<name>.<ext>`; a clash gets a `-N`
//! suffix. Registering writes a `<file>.json` sidecar with the catalog entry
//! and keeps it in memory keyed by the returned `MediaRef`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::common::{MediaRef, PostId};
use crate::kernel::{BaseMediaStore, NewAttachment, StoredFile};

/// Give up finding a free name after this many suffixes.
const MAX_SUFFIX: u32 = 1000;

/// Catalog entry for a stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub media_ref: MediaRef,
    pub post_id: PostId,
    pub mime_type: String,
    pub title: String,
    pub size: usize,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

pub struct LocalMediaStore {
    root: PathBuf,
    catalog: RwLock<HashMap<MediaRef, MediaRecord>>,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            catalog: RwLock::new(HashMap::new()),
        }
    }

    pub async fn find(&self, media_ref: &MediaRef) -> Option<MediaRecord> {
        self.catalog.read().await.get(media_ref).cloned()
    }

    pub fn path_of(&self, media_ref: &MediaRef) -> PathBuf {
        self.root.join(media_ref.as_str())
    }
}

/// `name.ext` -> `name-N.ext`
fn with_suffix(file_name: &str, n: u32) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, n, ext),
        _ => format!("{}-{}", file_name, n),
    }
}

#[async_trait]
impl BaseMediaStore for LocalMediaStore {
    async fn write_file(
        &self,
        file_name: &str,
        data: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> Result<StoredFile> {
        let subdir = format!("{:04}/{:02}", uploaded_at.year(), uploaded_at.month());
        let dir = self.root.join(&subdir);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        for n in 0..=MAX_SUFFIX {
            let candidate = if n == 0 {
                file_name.to_string()
            } else {
                with_suffix(file_name, n)
            };
            let path = dir.join(&candidate);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()))
                }
            };

            file.write_all(data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            file.flush().await?;

            debug!(path = %path.display(), bytes = data.len(), "Media file written");
            return Ok(StoredFile {
                relative_path: format!("{}/{}", subdir, candidate),
                absolute_path: path,
                size: data.len(),
            });
        }

        anyhow::bail!("No free file name for {} in {}", file_name, dir.display())
    }

    async fn register(&self, file: &StoredFile, attachment: NewAttachment) -> Result<MediaRef> {
        let media_ref = MediaRef::new(file.relative_path.clone());
        let record = MediaRecord {
            media_ref: media_ref.clone(),
            post_id: attachment.post_id,
            mime_type: attachment.mime_type,
            title: attachment.title,
            size: file.size,
            created_at: attachment.created_at,
        };

        let mut sidecar = file.absolute_path.clone().into_os_string();
        sidecar.push(".json");
        let sidecar = PathBuf::from(sidecar);
        tokio::fs::write(&sidecar, serde_json::to_vec_pretty(&record)?)
            .await
            .with_context(|| format!("Failed to write {}", sidecar.display()))?;

        self.catalog.write().await.insert(media_ref.clone(), record);
        Ok(media_ref)
    }

    async fn remove_file(&self, file: &StoredFile) -> Result<()> {
        match tokio::fs::remove_file(&file.absolute_path).await {
            Ok(()) => {
                debug!(path = %file.absolute_path.display(), "Media file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove {}", file.absolute_path.display())),
        }
    }
}
