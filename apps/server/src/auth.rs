use axum::http::{header, HeaderMap, StatusCode};
use chrono::{NaiveDateTime, TimeDelta};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::collections::HashSet;

use crate::validation::is_valid_email;

type HmacSha256 = Hmac<Sha256>;

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LEN: usize = 6;
/// Bearer tokens are valid for 24 hours after login.
const MAX_TOKEN_AGE_SECS: i64 = 86400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

struct IssuedToken {
    user: User,
    issued_at: NaiveDateTime,
}

impl IssuedToken {
    fn expired(&self, now: NaiveDateTime) -> bool {
        now - self.issued_at > TimeDelta::seconds(MAX_TOKEN_AGE_SECS)
    }
}

struct StoredUser {
    user: User,
    salt: String,
    password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Todos los campos son requeridos")]
    MissingFields,

    #[error("Email y contraseña son requeridos")]
    MissingCredentials,

    #[error("El nombre debe tener al menos 2 caracteres")]
    NameTooShort,

    #[error("La contraseña debe tener al menos 6 caracteres")]
    PasswordTooShort,

    #[error("Ingresa un email válido")]
    InvalidEmail,

    #[error("Este email ya está registrado")]
    EmailTaken,

    #[error("Credenciales incorrectas")]
    InvalidCredentials,

    #[error("Sesión inválida o expirada")]
    Unauthorized,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// In-memory user registry and bearer tokens.
#[derive(Default)]
pub struct AuthStore {
    /// Keyed by lower-cased email.
    users: DashMap<String, StoredUser>,
    tokens: DashMap<String, IssuedToken>,
}

impl AuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Create an account and log it in.
    pub fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        now: NaiveDateTime,
    ) -> Result<(String, User), AuthError> {
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        let name = name.trim();
        if name.chars().count() < 2 {
            return Err(AuthError::NameTooShort);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }

        let user = match self.users.entry(email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(AuthError::EmailTaken),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let salt = uuid::Uuid::new_v4().simple().to_string();
                let user = User {
                    id: uuid::Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    email,
                    created_at: now,
                };
                slot.insert(StoredUser {
                    user: user.clone(),
                    password_hash: hash_password(&salt, password),
                    salt,
                });
                user
            }
        };

        tracing::info!("Registered user {}", user.email);
        Ok((self.issue_token(&user, now), user))
    }

    pub fn login(
        &self,
        email: &str,
        password: &str,
        now: NaiveDateTime,
    ) -> Result<(String, User), AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let user = {
            let stored = self
                .users
                .get(&email.trim().to_lowercase())
                .ok_or(AuthError::InvalidCredentials)?;
            if !verify_password(&stored.salt, password, &stored.password_hash) {
                tracing::warn!("Failed login for {}", stored.user.email);
                return Err(AuthError::InvalidCredentials);
            }
            stored.user.clone()
        };

        tracing::info!("User {} logged in", user.email);
        Ok((self.issue_token(&user, now), user))
    }

    /// Revoke a token, returning its owner.
    pub fn logout(&self, token: &str) -> Option<User> {
        let (_, issued) = self.tokens.remove(token)?;
        tracing::info!("User {} logged out", issued.user.email);
        Some(issued.user)
    }

    /// Owner of a live token. An expired token is revoked on sight.
    pub fn user_for_token(&self, token: &str, now: NaiveDateTime) -> Option<User> {
        let email = {
            let issued = self.tokens.get(token)?;
            if !issued.expired(now) {
                return Some(issued.user.clone());
            }
            issued.user.email.clone()
        };
        self.tokens.remove(token);
        tracing::info!("Token for {} expired", email);
        None
    }

    /// Drop every expired token. Returns how many were removed.
    pub fn prune_expired(&self, now: NaiveDateTime) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, issued| !issued.expired(now));
        before.saturating_sub(self.tokens.len())
    }

    /// Ids of users holding at least one live token.
    pub fn active_user_ids(&self, now: NaiveDateTime) -> HashSet<String> {
        self.tokens
            .iter()
            .filter(|t| !t.expired(now))
            .map(|t| t.user.id.clone())
            .collect()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn issue_token(&self, user: &User, now: NaiveDateTime) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.tokens.insert(
            token.clone(),
            IssuedToken {
                user: user.clone(),
                issued_at: now,
            },
        );
        token
    }
}

/// HMAC-SHA256 keyed by the per-user salt, hex encoded.
fn hash_password(salt: &str, password: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC can take key of any size");
    mac.update(password.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn verify_password(salt: &str, password: &str, expected_hex: &str) -> bool {
    let Ok(expected) = hex::decode(expected_hex) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC can take key of any size");
    mac.update(password.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ── Tests ──
