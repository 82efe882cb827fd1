//! Bearer-token authentication: the request gate, registration and login.
//!
//! Tokens are opaque 48-hex-char strings. Each login issues a fresh token and
//! overwrites the stored one, so a user has at most one live session and a
//! stale token stops resolving immediately.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use axum::Json;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use rand::RngCore;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::Error;
use crate::models::User;
use crate::routes::AppState;

/// The authenticated user for a request, resolved from the
/// `Authorization: Bearer <token>` header. Handlers that take this extractor
/// never run for unauthenticated requests.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Error> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(Error::Unauthorized)?;
        let user = state
            .store
            .find_user_by_token(token)
            .await?
            .ok_or(Error::Unauthorized)?;
        Ok(CurrentUser(user))
    }
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let username = credentials.username.trim();
    if username.is_empty() || credentials.password.len() < 4 {
        return Err(Error::validation(
            "username and password (>=4 chars) required",
        ));
    }
    if state.store.find_user_by_username(username).await?.is_some() {
        return Err(Error::Conflict("username already exists".into()));
    }

    let password_hash = hash_password(&credentials.password)?;
    let user = state.store.create_user(username, &password_hash).await?;
    tracing::info!(username = %user.username, "registered user");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "created", "username": user.username })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Value>, Error> {
    let username = credentials.username.trim();
    let user = state
        .store
        .find_user_by_username(username)
        .await?
        .ok_or(Error::Unauthorized)?;
    if !verify_password(&credentials.password, &user.password_hash) {
        return Err(Error::Unauthorized);
    }

    let token = generate_token();
    state.store.set_user_token(user.id, &token).await?;
    tracing::debug!(username = %user.username, "issued new token");

    Ok(Json(json!({ "token": token, "username": user.username })))
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn generate_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_salted_and_verifiable() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();
        assert_ne!(first, second);
        assert_ne!(first, "hunter2");
        assert!(verify_password("hunter2", &first));
        assert!(!verify_password("hunter3", &first));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
