use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use crate::ports::auth::TokenProvider;
use crate::ports::spotify::ApiError;
use crate::spotify_rs::auth::{SPOTIFY_TOKEN_URL, refresh_access_token};

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: TimeDelta = TimeDelta::seconds(60);
const MAX_TOKEN_LIFETIME_SECS: u64 = 86_400;

/// A pre-issued access token, used as-is.
pub struct StaticToken {
    access_token: String,
}

impl StaticToken {
    pub fn new(access_token: String) -> Self {
        Self { access_token }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.access_token.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges a stored refresh token for access tokens, caching each one until
/// shortly before it expires.
pub struct RefreshingToken {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: Mutex<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl RefreshingToken {
    pub fn new(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            client_id,
            client_secret,
            refresh_token: Mutex::new(refresh_token),
            cached: Mutex::new(None),
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Seeds the cache with a token that is already known to be valid.
    #[cfg(test)]
    pub fn with_access_token(self, access_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            cached: Mutex::new(Some(CachedToken {
                access_token,
                expires_at,
            })),
            ..self
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for RefreshingToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref()
            && token.expires_at - EXPIRY_MARGIN > Utc::now()
        {
            return Ok(token.access_token.clone());
        }

        tracing::debug!("Refreshing Spotify access token");
        let mut refresh_token = self.refresh_token.lock().await;
        let response = refresh_access_token(
            &self.http,
            &self.token_url,
            &self.client_id,
            &self.client_secret,
            &refresh_token,
        )
        .await
        .map_err(|e| ApiError::Token(e.to_string()))?;

        // Spotify may rotate the refresh token.
        if let Some(rotated) = response.refresh_token {
            *refresh_token = rotated;
        }

        let expires_in = response.expires_in.min(MAX_TOKEN_LIFETIME_SECS) as i64;
        let token = CachedToken {
            access_token: response.access_token,
            expires_at: Utc::now() + TimeDelta::seconds(expires_in),
        };
        *cached = Some(token.clone());

        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new("abc".into());
        assert_eq!(provider.access_token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let provider = RefreshingToken::new("id".into(), "secret".into(), "rt".into())
            .with_token_url("http://127.0.0.1:9/api/token")
            .with_access_token("cached".into(), Utc::now() + TimeDelta::hours(1));

        assert_eq!(provider.access_token().await.unwrap(), "cached");
        assert_eq!(provider.access_token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn test_expired_token_refresh_failure_is_reported() {
        let provider = RefreshingToken::new("id".into(), "secret".into(), "rt".into())
            .with_token_url("http://127.0.0.1:9/api/token")
            .with_access_token("stale".into(), Utc::now() + TimeDelta::seconds(30));

        let result = provider.access_token().await;
        assert!(matches!(result, Err(ApiError::Token(_))));
    }
}
