use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use url::Url;

use crate::ports::auth::TokenProvider;
use crate::ports::spotify::ApiError;
use crate::spotify_rs::types::{
    AddTracksBody, CreatePlaylistBody, Paging, PlaylistTrackObject, RemoveTracksBody,
    SpotifyPlaylist, SpotifyUser, TrackUri,
};

pub const SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com/v1/";

const PLAYLISTS_PAGE_LIMIT: &str = "50";
const TRACKS_PAGE_LIMIT: &str = "100";

#[derive(Debug, Clone)]
pub struct SpotifyClientOptions {
    pub base_url: Url,
    pub timeout: Duration,
    /// Retries for idempotent reads only. Mutations are sent once.
    pub max_retries: usize,
}

#[cfg(test)]
impl Default for SpotifyClientOptions {
    fn default() -> Self {
        Self {
            base_url: Url::parse(SPOTIFY_API_BASE_URL).expect("static url is valid"),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

/// Spotify Web API client
pub struct SpotifyClient {
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    options: SpotifyClientOptions,
}

impl SpotifyClient {
    pub fn new(tokens: Arc<dyn TokenProvider>, mut options: SpotifyClientOptions) -> Self {
        // Url::join drops the last path segment unless the base ends in '/'.
        if !options.base_url.path().ends_with('/') {
            let path = format!("{}/", options.base_url.path());
            options.base_url.set_path(&path);
        }

        Self {
            client: reqwest::Client::new(),
            tokens,
            options,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.options
            .base_url
            .join(path)
            .map_err(|e| ApiError::Decode(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or("Failed to get error text".to_string());
        Err(ApiError::from_status(status, body))
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .timeout(self.options.timeout)
            .send()
            .await?;

        Self::check_status(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// GET with exponential backoff on rate limiting, server errors and
    /// connection failures.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        (|| async { self.get_once::<T>(url).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_times(self.options.max_retries),
            )
            .when(|e: &ApiError| e.is_transient())
            .notify(|e: &ApiError, delay: Duration| {
                tracing::warn!("Retrying GET {} in {:?} after error: {}", url, delay, e);
            })
            .await
    }

    /// Get the current user's profile
    pub async fn get_current_user(&self) -> Result<SpotifyUser, ApiError> {
        let url = self.endpoint("me")?;
        self.get_json(url.as_str()).await
    }

    /// Get one page of a user's playlists. `cursor` is the `next` url of the
    /// previous page.
    pub async fn get_user_playlists_page(
        &self,
        user_id: &str,
        cursor: Option<&str>,
    ) -> Result<Paging<SpotifyPlaylist>, ApiError> {
        let url = match cursor {
            Some(next) => next.to_string(),
            None => {
                let mut url = self.endpoint(&format!("users/{}/playlists", user_id))?;
                url.query_pairs_mut()
                    .append_pair("limit", PLAYLISTS_PAGE_LIMIT);
                url.to_string()
            }
        };

        tracing::debug!("Fetching playlists page: {}", url);
        self.get_json(&url).await
    }

    pub async fn get_playlist(&self, playlist_id: &str) -> Result<SpotifyPlaylist, ApiError> {
        let mut url = self.endpoint(&format!("playlists/{}", playlist_id))?;
        url.query_pairs_mut()
            .append_pair("fields", "id,name,owner(id),tracks(total)");
        self.get_json(url.as_str()).await
    }

    /// Get one page of a playlist's items.
    pub async fn get_playlist_tracks_page(
        &self,
        playlist_id: &str,
        cursor: Option<&str>,
    ) -> Result<Paging<PlaylistTrackObject>, ApiError> {
        let url = match cursor {
            Some(next) => next.to_string(),
            None => {
                let mut url = self.endpoint(&format!("playlists/{}/tracks", playlist_id))?;
                url.query_pairs_mut().append_pair("limit", TRACKS_PAGE_LIMIT);
                url.to_string()
            }
        };

        tracing::debug!("Fetching tracks page: {}", url);
        self.get_json(&url).await
    }

    pub async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> Result<SpotifyPlaylist, ApiError> {
        let url = self.endpoint(&format!("users/{}/playlists", user_id))?;
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&CreatePlaylistBody {
                name,
                description,
                public: false,
            })
            .timeout(self.options.timeout)
            .send()
            .await?;

        Self::check_status(response)
            .await?
            .json::<SpotifyPlaylist>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("playlists/{}/tracks", playlist_id))?;
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&AddTracksBody { uris })
            .timeout(self.options.timeout)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    pub async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("playlists/{}/tracks", playlist_id))?;
        let token = self.tokens.access_token().await?;

        let body = RemoveTracksBody {
            tracks: uris.iter().map(|uri| TrackUri { uri }).collect(),
        };

        let response = self
            .client
            .delete(url)
            .bearer_auth(token)
            .json(&body)
            .timeout(self.options.timeout)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::auth::MockTokenProvider;

    fn client_with_base(base: &str) -> SpotifyClient {
        let options = SpotifyClientOptions {
            base_url: Url::parse(base).unwrap(),
            ..SpotifyClientOptions::default()
        };
        SpotifyClient::new(Arc::new(MockTokenProvider::new()), options)
    }

    #[test]
    fn test_endpoint_keeps_version_segment() {
        let client = client_with_base("https://api.spotify.com/v1");
        let url = client.endpoint("playlists/abc/tracks").unwrap();
        assert_eq!(url.as_str(), "https://api.spotify.com/v1/playlists/abc/tracks");
    }

    #[test]
    fn test_default_base_url() {
        let client = client_with_base(SPOTIFY_API_BASE_URL);
        let url = client.endpoint("me").unwrap();
        assert_eq!(url.as_str(), "https://api.spotify.com/v1/me");
    }

    #[tokio::test]
    async fn test_token_failure_is_not_sent() {
        let mut tokens = MockTokenProvider::new();
        tokens
            .expect_access_token()
            .times(1)
            .returning(|| Err(ApiError::Token("expired".into())));
        let client = SpotifyClient::new(Arc::new(tokens), SpotifyClientOptions::default());

        let result = client.get_current_user().await;
        assert!(matches!(result, Err(ApiError::Token(_))));
    }

    fn unreachable_client(tokens: MockTokenProvider, max_retries: usize) -> SpotifyClient {
        let options = SpotifyClientOptions {
            base_url: Url::parse("http://127.0.0.1:9/v1/").unwrap(),
            timeout: Duration::from_secs(1),
            max_retries,
        };
        SpotifyClient::new(Arc::new(tokens), options)
    }

    #[tokio::test]
    async fn test_reads_are_retried_on_connection_errors() {
        let mut tokens = MockTokenProvider::new();
        tokens
            .expect_access_token()
            .times(3)
            .returning(|| Ok("token".into()));
        let client = unreachable_client(tokens, 2);

        let result = client.get_current_user().await;
        assert!(matches!(result, Err(ref e) if e.is_transient()));
    }

    #[tokio::test]
    async fn test_mutations_are_sent_once() {
        let mut tokens = MockTokenProvider::new();
        tokens
            .expect_access_token()
            .times(2)
            .returning(|| Ok("token".into()));
        let client = unreachable_client(tokens, 3);
        let uris = vec!["spotify:track:a".to_string()];

        assert!(client.add_tracks("p1", &uris).await.is_err());
        assert!(client.remove_tracks("p1", &uris).await.is_err());
    }
}
