use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::spotify::types::SpotifyTokenResponse;

pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Tokens are refreshed this long before Spotify says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Spotify rejected the client credentials: {reason}")]
    InvalidCredentials { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Spotify returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Client credentials flow with an in-memory token cache.
/// https://developer.spotify.com/documentation/web-api/tutorials/client-credentials-flow
pub struct ClientCredentials {
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl ClientCredentials {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            token: Mutex::new(None),
        }
    }

    /// Current access token, requesting a new one when none is cached or the
    /// cached one is about to expire.
    pub async fn access_token(
        &self,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<String, CatalogError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.expires_at
        {
            return Ok(token.access_token.clone());
        }

        tracing::debug!("Requesting Spotify access token");
        let response = self.request_token(client, timeout).await?;
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        let token = CachedToken {
            access_token: response.access_token,
            expires_at: Instant::now() + lifetime,
        };
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token, e.g. after a 401.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    async fn request_token(
        &self,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<SpotifyTokenResponse, CatalogError> {
        let response = client
            .post(SPOTIFY_TOKEN_URL)
            .form(&[("grant_type", "client_credentials")])
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .timeout(timeout)
            .send()
            .await
            .map_err(CatalogError::FailedToSendRequest)?;

        if !response.status().is_success() {
            return Err(CatalogError::InvalidCredentials {
                reason: response
                    .text()
                    .await
                    .unwrap_or("Failed to get error text".to_string()),
            });
        }

        response
            .json()
            .await
            .map_err(CatalogError::FailedToParseResponse)
    }
}
