use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Serialize;

use crate::common::{MediaRef, PostId};
use crate::domains::featured_image::GenerationStatus;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::Operator;

/// Generation status of a post as shown next to the editor
#[derive(Debug, Serialize)]
pub struct GenerationPanel {
    pub post_id: PostId,
    pub status: GenerationStatus,
    pub media_ref: Option<MediaRef>,
    /// Epoch seconds
    pub generated_at: Option<i64>,
    /// Present only for published posts while an API key is configured
    pub regenerate: Option<RegenerateAction>,
}

#[derive(Debug, Serialize)]
pub struct RegenerateAction {
    pub label: &'static str,
    /// False while a run is in progress
    pub enabled: bool,
}

pub async fn generation_status_handler(
    Extension(state): Extension<AppState>,
    _operator: Operator,
    Path(post_id): Path<PostId>,
) -> Result<Json<GenerationPanel>, ApiError> {
    let store = &state.deps.post_store;
    let post = store
        .find_post(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("post {} not found", post_id)))?;
    let meta = store.generation_meta(post_id).await?;

    let regenerate = (post.is_published() && state.deps.settings.snapshot().has_api_key()).then(|| {
        RegenerateAction {
            label: if meta.status == GenerationStatus::None {
                "Generate Image"
            } else {
                "Regenerate Image"
            },
            enabled: meta.status != GenerationStatus::Processing,
        }
    });

    Ok(Json(GenerationPanel {
        post_id,
        status: meta.status,
        media_ref: meta.media_ref,
        generated_at: meta.generated_at.map(|at| at.timestamp()),
        regenerate,
    }))
}
