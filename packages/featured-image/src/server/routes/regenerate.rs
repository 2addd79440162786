use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::common::PostId;
use crate::domains::featured_image::activities::regenerate;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::Operator;

/// Nonce action name for manual regeneration
pub const REGENERATE_ACTION: &str = "regenerate";

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Deserialize)]
pub struct RegenerateQuery {
    pub token: Option<String>,
}

#[derive(Serialize)]
pub struct RegenerateResponse {
    pub post_id: PostId,
    /// False when a run for the post was already queued
    pub scheduled: bool,
}

async fn require_edit(state: &AppState, operator: &Operator, post_id: PostId) -> Result<(), ApiError> {
    if state.deps.post_store.can_edit(&operator.0, post_id).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden("not allowed to edit this post"))
    }
}

/// Issue a freshness token for the regenerate action.
pub async fn regenerate_token_handler(
    Extension(state): Extension<AppState>,
    operator: Operator,
    Path(post_id): Path<PostId>,
) -> Result<Json<TokenResponse>, ApiError> {
    require_edit(&state, &operator, post_id).await?;

    let token = state
        .nonces
        .issue(REGENERATE_ACTION, post_id, &operator.0, Utc::now());
    Ok(Json(TokenResponse { token }))
}

/// Clear the post's generation state and queue a new run.
pub async fn regenerate_handler(
    Extension(state): Extension<AppState>,
    operator: Operator,
    Path(post_id): Path<PostId>,
    Query(query): Query<RegenerateQuery>,
) -> Result<(StatusCode, Json<RegenerateResponse>), ApiError> {
    require_edit(&state, &operator, post_id).await?;

    let token = query
        .token
        .ok_or_else(|| ApiError::bad_request("missing token"))?;
    if !state
        .nonces
        .verify(&token, REGENERATE_ACTION, post_id, &operator.0, Utc::now())
    {
        return Err(ApiError::forbidden("token is stale or already used"));
    }

    let result = regenerate(post_id, &state.deps).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RegenerateResponse {
            post_id,
            scheduled: result.is_created(),
        }),
    ))
}
