//! HTTP client for the CipherVault server.

use crate::sync::models::{
    RegisterRequest, SyncRequest, SyncResponse, TokenResponse, UserCheckResponse, UserProfile,
};
use crate::sync::{SyncTransport, TransportError};
use async_trait::async_trait;
use std::time::Duration;

/// Timeout for the diff-phase snapshot fetch.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for push batches.
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for login/registration calls.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the server API. Carries the bearer token once
/// authenticated; all timeouts are per request, there is no
/// cancellation — a timed-out call is a hard failure.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Attach a bearer token obtained from [`ApiClient::login`].
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange credentials for a bearer token (`POST /auth/token`,
    /// form-encoded). The token is stored on the client and returned.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<String, TransportError> {
        let url = format!("{}/auth/token", self.base_url);
        let resp = self
            .http
            .post(&url)
            .timeout(AUTH_TIMEOUT)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let token: TokenResponse = check_status(resp).await?;
        self.token = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    /// Create a server account bound to a client-generated KDF salt.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        kdf_salt: &str,
    ) -> Result<(), TransportError> {
        let url = format!("{}/auth/register", self.base_url);
        let body = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            kdf_salt: kdf_salt.to_string(),
        };
        let resp = self
            .http
            .post(&url)
            .timeout(AUTH_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        check_status::<serde_json::Value>(resp).await?;
        Ok(())
    }

    /// Fetch the authenticated user's profile, including the KDF salt
    /// a second device needs to derive the vault key.
    pub async fn fetch_profile(&self) -> Result<UserProfile, TransportError> {
        let url = format!("{}/auth/me", self.base_url);
        let resp = self
            .authorized(self.http.get(&url).timeout(AUTH_TIMEOUT))?
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(resp).await
    }

    /// Whether a username is already registered.
    pub async fn check_username(&self, username: &str) -> Result<bool, TransportError> {
        let url = format!("{}/auth/check/{}", self.base_url, username);
        let resp = self
            .http
            .get(&url)
            .timeout(AUTH_TIMEOUT)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let check: UserCheckResponse = check_status(resp).await?;
        Ok(check.exists)
    }

    async fn post_sync(
        &self,
        request: &SyncRequest,
        timeout: Duration,
    ) -> Result<SyncResponse, TransportError> {
        let url = format!("{}/api/v1/sync", self.base_url);
        let resp = self
            .authorized(self.http.post(&url).timeout(timeout).json(request))?
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(resp).await
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let token = self.token.as_ref().ok_or_else(|| TransportError::Status {
            status: 401,
            message: "not logged in".to_string(),
        })?;
        Ok(builder.bearer_auth(token))
    }
}

#[async_trait]
impl SyncTransport for ApiClient {
    async fn fetch_snapshot(&self) -> Result<SyncResponse, TransportError> {
        // Zero cursor: the diff phase always re-evaluates the full
        // remote history against local state.
        let request = SyncRequest {
            last_sync_timestamp: 0.0,
            push_items: Vec::new(),
        };
        self.post_sync(&request, SNAPSHOT_TIMEOUT).await
    }

    async fn push(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError> {
        self.post_sync(request, PUSH_TIMEOUT).await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(e.to_string())
    }
}

async fn check_status<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, TransportError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_else(|_| "unknown".to_string());
        return Err(TransportError::Status {
            status: status.as_u16(),
            message,
        });
    }
    resp.json()
        .await
        .map_err(|e| TransportError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:8700/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8700");
        assert!(!client.is_authenticated());
    }

    #[test]
    fn set_token_authenticates() {
        let mut client = ApiClient::new("http://localhost:8700").unwrap();
        client.set_token("abc");
        assert!(client.is_authenticated());
    }
}
