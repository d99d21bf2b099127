//! Account and session handlers.

use crate::auth::{hash_password, issue_token, verify_password, Identity};
use crate::error::ServerError;
use crate::storage::{now_ts, ServerStorage};
use axum::extract::{Path, State};
use axum::{Extension, Form, Json};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// Client-generated vault KDF salt, stored verbatim so other
    /// devices can retrieve it. Never used server-side.
    pub kdf_salt: String,
}

#[derive(Serialize)]
pub struct UserProfile {
    pub username: String,
    pub kdf_salt: String,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Serialize)]
pub struct UserCheckResponse {
    pub exists: bool,
}

/// `POST /auth/register`
pub async fn register(
    State(storage): State<ServerStorage>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserProfile>, ServerError> {
    if req.username.is_empty() || req.password.is_empty() || req.kdf_salt.is_empty() {
        return Err(ServerError::BadRequest(
            "username, password and kdf_salt are required".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password);
    let inserted = storage.conn()?.execute(
        "INSERT OR IGNORE INTO users (username, password_hash, kdf_salt, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![req.username, password_hash, req.kdf_salt, now_ts()],
    )?;

    if inserted == 0 {
        return Err(ServerError::Conflict("Username already taken".to_string()));
    }

    info!(username = %req.username, "registered user");
    Ok(Json(UserProfile {
        username: req.username,
        kdf_salt: req.kdf_salt,
    }))
}

/// `POST /auth/token` (form-encoded credentials)
pub async fn token(
    State(storage): State<ServerStorage>,
    Form(req): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, ServerError> {
    let password_hash: Option<String> = storage
        .conn()?
        .query_row(
            "SELECT password_hash FROM users WHERE username = ?1",
            [&req.username],
            |row| row.get(0),
        )
        .optional()?;

    // same rejection whether the user is unknown or the password is wrong
    let valid = password_hash
        .map(|stored| verify_password(&req.password, &stored))
        .unwrap_or(false);
    if !valid {
        return Err(ServerError::Auth(
            "Incorrect username or password".to_string(),
        ));
    }

    let access_token = issue_token(&storage, &req.username)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// `GET /auth/check/{username}`
pub async fn check(
    State(storage): State<ServerStorage>,
    Path(username): Path<String>,
) -> Result<Json<UserCheckResponse>, ServerError> {
    let exists: bool = storage.conn()?.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [&username],
        |row| row.get(0),
    )?;
    Ok(Json(UserCheckResponse { exists }))
}

/// `GET /auth/me`
pub async fn me(
    State(storage): State<ServerStorage>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserProfile>, ServerError> {
    let kdf_salt: String = storage
        .conn()?
        .query_row(
            "SELECT kdf_salt FROM users WHERE username = ?1",
            [&identity.0],
            |row| row.get(0),
        )
        .map_err(|_| ServerError::NotFound("User not found".to_string()))?;

    Ok(Json(UserProfile {
        username: identity.0,
        kdf_salt,
    }))
}
