//! OAuth token exchange and refresh
//!
//! Both operations POST a form to the token endpoint with different grant
//! types. Any status of 400 or above is a hard error carrying the response
//! body. `issued_at` is stamped after the response is parsed, so expiry is
//! measured against this process's clock rather than the provider's.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime};

use common::Secret;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Wire shape of the token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Google only rotates refresh tokens occasionally; usually absent on refresh.
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// A bearer token and the refresh token that renews it.
///
/// Owned by whoever requested it; never shared between requests.
#[derive(Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds of validity from `issued_at`
    pub expires_in: i64,
    pub issued_at: SystemTime,
}

impl AccessToken {
    /// Instant after which the access token must not be used for a new call.
    ///
    /// `None` when `expires_in` is too large to represent on this platform.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.issued_at
            .checked_add(Duration::from_secs(self.expires_in.max(0) as u64))
    }

    /// Best-effort check against the local clock.
    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .is_some_and(|expires_at| SystemTime::now() >= expires_at)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Source of fresh access tokens for code running outside a request.
///
/// Uses `Pin<Box<dyn Future>>` so implementations can sit behind `Arc<dyn TokenRefresher>`.
pub trait TokenRefresher: Send + Sync {
    fn refresh_access_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AccessToken>> + Send + 'a>>;
}

/// Client for the OAuth token endpoint.
#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: Secret<String>,
}

impl TokenClient {
    pub fn new(
        http: reqwest::Client,
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Secret<String>,
    ) -> Self {
        Self {
            http,
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// Exchange an authorization code from the OAuth callback for tokens.
    ///
    /// `redirect_uri` must match the one used to build the authorization URL.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<AccessToken> {
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        Ok(AccessToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or_default(),
            expires_in: response.expires_in,
            issued_at: SystemTime::now(),
        })
    }

    /// Obtain a new access token from a refresh token.
    ///
    /// When the provider does not rotate the refresh token, the one passed in
    /// is carried into the result, so a successful refresh always leaves the
    /// caller holding a usable refresh token.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        let rotated = response.refresh_token.filter(|t| !t.is_empty());
        debug!(rotated = rotated.is_some(), "access token refreshed");

        Ok(AccessToken {
            access_token: response.access_token,
            refresh_token: rotated.unwrap_or_else(|| refresh_token.to_string()),
            expires_in: response.expires_in,
            issued_at: SystemTime::now(),
        })
    }

    async fn request_token(&self, grant: &[(&str, &str)]) -> Result<TokenResponse> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose().as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Http(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading token response: {e}")))?;

        if status.is_client_error() || status.is_server_error() {
            // 401/403 means the client or refresh token is revoked or invalid
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::InvalidCredentials {
                    status: status.as_u16(),
                    body,
                });
            }
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))?;
        if parsed.access_token.is_empty() {
            return Err(Error::InvalidResponse("empty access_token".into()));
        }
        Ok(parsed)
    }
}

impl TokenRefresher for TokenClient {
    fn refresh_access_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AccessToken>> + Send + 'a>> {
        Box::pin(self.refresh(refresh_token))
    }
}
