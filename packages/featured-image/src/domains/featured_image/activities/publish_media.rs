//! Store a generated image in the media library.

use chrono::{DateTime, Utc};
use gemini_client::GeneratedImage;
use tracing::{debug, info, warn};

use crate::common::utils::{sanitize_file_name, ImageFormat};
use crate::common::{MediaRef, PostId};
use crate::kernel::{BaseMediaStore, NewAttachment};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to write image file: {0:#}")]
    Write(anyhow::Error),

    #[error("failed to register media: {0:#}")]
    Register(anyhow::Error),
}

/// `{date}`, `{post_id}` and `{timestamp}` filled in, sanitized, plus extension.
pub fn media_file_name(
    template: &str,
    post_id: PostId,
    format: ImageFormat,
    now: DateTime<Utc>,
) -> String {
    let base = template
        .replace("{date}", &now.format("%Y-%m-%d").to_string())
        .replace("{post_id}", &post_id.to_string())
        .replace("{timestamp}", &now.timestamp().to_string());
    format!("{}.{}", sanitize_file_name(&base), format.extension())
}

/// Write the bytes, then add them to the catalog attached to the post.
pub async fn publish_media(
    post_id: PostId,
    image: &GeneratedImage,
    filename_template: &str,
    now: DateTime<Utc>,
    store: &dyn BaseMediaStore,
) -> Result<MediaRef, PublishError> {
    let format = ImageFormat::from_mime(&image.mime_type);
    let file_name = media_file_name(filename_template, post_id, format, now);

    info!(
        post_id = %post_id,
        file_name = %file_name,
        mime_type = %image.mime_type,
        bytes = image.data.len(),
        "Storing generated image"
    );

    let file = store
        .write_file(&file_name, &image.data, now)
        .await
        .map_err(PublishError::Write)?;
    debug!(path = %file.absolute_path.display(), "Image file written");

    let attachment = NewAttachment {
        post_id,
        mime_type: image.mime_type.clone(),
        title: file_name,
        created_at: now,
    };
    let media_ref = match store.register(&file, attachment).await {
        Ok(media_ref) => media_ref,
        Err(e) => {
            if let Err(remove_err) = store.remove_file(&file).await {
                warn!(
                    path = %file.absolute_path.display(),
                    error = %remove_err,
                    "Could not remove unregistered image file"
                );
            }
            return Err(PublishError::Register(e));
        }
    };

    info!(post_id = %post_id, media_ref = %media_ref, "Image added to media library");
    Ok(media_ref)
}
