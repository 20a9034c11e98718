use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;

use super::{require_caller, ApiError};
use crate::models::ApiResponse;
use crate::settings::{SettingsPatch, UserSettings};
use crate::AppState;

/// GET /api/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<UserSettings>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let settings = caller.read().settings().clone();
    Ok(Json(ApiResponse::success(settings)))
}

/// PUT /api/settings
///
/// Invalid updates are rejected whole; the stored settings stay untouched.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<ApiResponse<UserSettings>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let mut session = caller.write();
    let next = session.settings().apply(patch)?;
    session.update_settings(next.clone());
    tracing::info!("Settings updated for {}", caller.user.email);
    Ok(Json(ApiResponse::success(next)))
}
