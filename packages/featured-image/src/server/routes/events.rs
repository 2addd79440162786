use axum::{extract::Extension, http::HeaderMap, http::StatusCode, Json};
use serde::Serialize;

use crate::domains::featured_image::{on_status_transition, PostStatusTransition, TriggerDecision};
use crate::server::app::AppState;
use crate::server::error::ApiError;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Serialize)]
pub struct TriggerResponse {
    decision: TriggerDecision,
}

/// Inbound post status transition from the publishing system.
///
/// Answers as soon as the run is queued; generation happens in the worker.
pub async fn post_status_handler(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(event): Json<PostStatusTransition>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    if let Some(secret) = &state.webhook_secret {
        let provided = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(secret.as_str()) {
            return Err(ApiError::unauthorized());
        }
    }

    let decision = on_status_transition(&event, &state.deps).await?;
    Ok((StatusCode::ACCEPTED, Json(TriggerResponse { decision })))
}
