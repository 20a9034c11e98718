pub mod account;
pub mod appointments;
pub mod calendar;
pub mod health;
pub mod settings;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::auth::{bearer_token, AuthError, User};
use crate::models::ApiResponse;
use crate::session::SchedulingSession;
use crate::validation::ValidationError;
use crate::AppState;

pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

pub fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(msg)))
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        api_error(e.status(), e.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    }
}

/// Authenticated user with their scheduling session.
pub struct Caller {
    pub token: String,
    pub user: User,
    session: Arc<RwLock<SchedulingSession>>,
}

impl Caller {
    pub fn read(&self) -> RwLockReadGuard<'_, SchedulingSession> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SchedulingSession> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolve the bearer token to a user and their session.
pub fn require_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let token = bearer_token(headers).ok_or(AuthError::Unauthorized)?;
    let user = state
        .auth
        .user_for_token(token, crate::local_now())
        .ok_or(AuthError::Unauthorized)?;
    Ok(Caller {
        token: token.to_string(),
        session: state.session_for(&user),
        user,
    })
}
