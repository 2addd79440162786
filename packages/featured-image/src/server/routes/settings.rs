use std::collections::BTreeMap;

use axum::{extract::Extension, Json};

use crate::config::SETTING_KEYS;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::Operator;

fn current(state: &AppState) -> Result<BTreeMap<String, String>, ApiError> {
    let settings = state.deps.settings.snapshot();
    SETTING_KEYS
        .iter()
        .map(|key| {
            settings
                .get(key)
                .map(|value| (key.to_string(), value))
                .map_err(|e| ApiError::bad_request(e.to_string()))
        })
        .collect()
}

fn require_admin(state: &AppState, operator: &Operator) -> Result<(), ApiError> {
    if state.is_admin(&operator.0) {
        Ok(())
    } else {
        Err(ApiError::forbidden("settings are admin only"))
    }
}

/// Current settings; the API key is redacted.
pub async fn read_settings_handler(
    Extension(state): Extension<AppState>,
    operator: Operator,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    require_admin(&state, &operator)?;
    Ok(Json(current(&state)?))
}

/// Update any subset of settings. Values are sanitized on write; an unknown
/// key rejects the whole request before anything changes.
pub async fn update_settings_handler(
    Extension(state): Extension<AppState>,
    operator: Operator,
    Json(changes): Json<BTreeMap<String, String>>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    require_admin(&state, &operator)?;

    if let Some(unknown) = changes.keys().find(|k| !SETTING_KEYS.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!("unknown setting '{}'", unknown)));
    }
    for (key, value) in &changes {
        state
            .deps
            .settings
            .update(key, value)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
    }
    tracing::info!(
        operator = %operator.0,
        keys = ?changes.keys().collect::<Vec<_>>(),
        "Settings updated"
    );

    Ok(Json(current(&state)?))
}
