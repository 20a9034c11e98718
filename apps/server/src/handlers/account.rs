use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;

use super::{require_caller, ApiError};
use crate::auth::User;
use crate::models::{ApiResponse, AuthResponse, LoginRequest, RegisterRequest};
use crate::AppState;

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let (token, user) =
        state
            .auth
            .register(&req.name, &req.email, &req.password, crate::local_now())?;
    state.session_for(&user);
    Ok(Json(ApiResponse::success(AuthResponse { token, user })))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let (token, user) = state
        .auth
        .login(&req.email, &req.password, crate::local_now())?;
    Ok(Json(ApiResponse::success(AuthResponse { token, user })))
}

/// POST /api/auth/logout
///
/// Revokes the token and drops the user's in-memory session, appointments
/// included.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    if let Some(user) = state.auth.logout(&caller.token) {
        state.end_session(&user.id);
    }
    Ok(Json(ApiResponse::success("Sesión cerrada")))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    Ok(Json(ApiResponse::success(caller.user)))
}
