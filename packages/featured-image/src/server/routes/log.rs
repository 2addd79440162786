use axum::{
    extract::{Extension, Query},
    http::StatusCode,
};
use serde::Deserialize;

use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::Operator;

pub const DEFAULT_LOG_LINES: usize = 200;

#[derive(Deserialize)]
pub struct LogQuery {
    pub lines: Option<usize>,
}

/// Tail of the diagnostic log as plain text.
pub async fn read_log_handler(
    Extension(state): Extension<AppState>,
    _operator: Operator,
    Query(query): Query<LogQuery>,
) -> Result<String, ApiError> {
    let lines = query.lines.unwrap_or(DEFAULT_LOG_LINES);
    state
        .diagnostic_log
        .recent_lines(lines)
        .map_err(|e| ApiError::from(anyhow::Error::from(e).context("Failed to read diagnostic log")))
}

pub async fn clear_log_handler(
    Extension(state): Extension<AppState>,
    operator: Operator,
) -> Result<StatusCode, ApiError> {
    state
        .diagnostic_log
        .clear()
        .map_err(|e| ApiError::from(anyhow::Error::from(e).context("Failed to clear diagnostic log")))?;
    tracing::info!(operator = %operator.0, "Diagnostic log cleared");
    Ok(StatusCode::NO_CONTENT)
}
