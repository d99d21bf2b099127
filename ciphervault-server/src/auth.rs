//! Bearer-token auth for the server.
//!
//! Passwords are hashed with PBKDF2-HMAC-SHA256 and a per-user salt.
//! Login issues an opaque random token persisted in the sessions table;
//! the middleware resolves it back to a username on every request. The
//! login password is unrelated to the vault encryption key, which never
//! reaches the server in any form.

use crate::error::ServerError;
use crate::storage::{now_ts, ServerStorage};
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

const PASSWORD_ITERATIONS: u32 = 600_000;
const PASSWORD_HASH_LEN: usize = 32;
const PASSWORD_SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 32;

pub const SESSION_TTL_SECS: f64 = 30.0 * 24.0 * 3600.0;

/// Authenticated username, inserted into request extensions by the
/// middleware.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

/// Hash a login password as `base64(salt)$base64(hash)`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; PASSWORD_SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; PASSWORD_HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PASSWORD_ITERATIONS, &mut hash);

    format!("{}${}", STANDARD.encode(salt), STANDARD.encode(hash))
}

/// Verify a login password against a stored `salt$hash` string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, hash_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt_b64), STANDARD.decode(hash_b64)) else {
        return false;
    };

    let mut hash = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PASSWORD_ITERATIONS, &mut hash);
    hash == expected
}

/// Issue a session token for `username` and persist it.
pub fn issue_token(storage: &ServerStorage, username: &str) -> Result<String, ServerError> {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);

    let now = now_ts();
    let conn = storage.conn()?;
    // expired sessions are pruned as new ones are issued, so the table
    // stays bounded by the number of live logins
    conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
    conn.execute(
        "INSERT INTO sessions (token, username, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![token, username, now, now + SESSION_TTL_SECS],
    )?;
    Ok(token)
}

/// Auth middleware: resolves the bearer token to a username and inserts
/// it into request extensions as [`Identity`].
pub async fn auth_middleware(
    State(storage): State<ServerStorage>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Auth("Missing Authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ServerError::Auth("Invalid auth scheme".to_string()))?;

    let username = {
        let conn = storage.conn()?;
        let (username, expires_at): (String, f64) = conn
            .query_row(
                "SELECT username, expires_at FROM sessions WHERE token = ?1",
                [token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|_| ServerError::Auth("Invalid token".to_string()))?;

        if expires_at <= now_ts() {
            return Err(ServerError::Auth("Token expired".to_string()));
        }
        username
    };

    request.extensions_mut().insert(Identity(username));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("hunter2"), hash_password("hunter2"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("hunter2", "not-a-hash"));
        assert!(!verify_password("hunter2", "!!$!!"));
    }

    #[test]
    fn issued_tokens_are_unique_and_persisted() {
        let storage = ServerStorage::in_memory().unwrap();
        storage
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO users (username, password_hash, kdf_salt, created_at)
                 VALUES ('alice', 'x', 's', 0)",
                [],
            )
            .unwrap();

        let t1 = issue_token(&storage, "alice").unwrap();
        let t2 = issue_token(&storage, "alice").unwrap();
        assert_ne!(t1, t2);

        let count: i64 = storage
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn expired_sessions_pruned_on_issue() {
        let storage = ServerStorage::in_memory().unwrap();
        storage
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO users (username, password_hash, kdf_salt, created_at)
                 VALUES ('alice', 'x', 's', 0)",
                [],
            )
            .unwrap();
        storage
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO sessions (token, username, created_at, expires_at)
                 VALUES ('stale', 'alice', 0.0, 1.0)",
                [],
            )
            .unwrap();

        issue_token(&storage, "alice").unwrap();

        let stale: i64 = storage
            .conn()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sessions WHERE token = 'stale'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stale, 0);

        // the freshly issued session is the only one left
        let total: i64 = storage
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 1);
    }
}
