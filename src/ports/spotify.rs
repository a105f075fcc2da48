use reqwest::StatusCode;

/// A track as seen by the merge engine. Identity is the `uri`.
#[derive(Debug, Clone)]
pub struct Track {
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Track {}

/// Snapshot of a playlist summary, fetched once per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// Approximate, as reported by the playlist summary.
    pub track_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

/// One page of a paginated listing. `next` is the opaque cursor for the
/// following page, `None` once the listing is exhausted.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Spotify rejected the access token (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("Resource not found")]
    NotFound,
    #[error("Spotify returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to send http request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    Decode(String),
    #[error("Failed to obtain an access token: {0}")]
    Token(String),
}

impl ApiError {
    /// Maps a non-success status into the matching error variant.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
                status: status.as_u16(),
            },
            StatusCode::NOT_FOUND => ApiError::NotFound,
            _ => ApiError::Status {
                status: status.as_u16(),
                body,
            },
        }
    }

    /// Whether a read may be retried by the transport.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Request(error) => error.is_timeout() || error.is_connect(),
            _ => false,
        }
    }
}

/// Port trait wrapping the Spotify Web API capabilities used by the merge engine.
///
/// Listing calls return a single page; callers follow `Page::next` until it is
/// `None`. Implementations live in `services::spotify::client` (production) or
/// test fakes.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyClient: Send + Sync {
    async fn current_user(&self) -> Result<SpotifyUser, ApiError>;

    async fn user_playlists_page(
        &self,
        user_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<PlaylistRef>, ApiError>;

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistRef, ApiError>;

    /// Items whose track is missing (removed or unavailable) are already dropped.
    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<Track>, ApiError>;

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> Result<PlaylistRef, ApiError>;

    /// Appends `uris` in order. At most 100 uris per call.
    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), ApiError>;

    /// Removes every occurrence of each uri. At most 100 uris per call.
    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), ApiError>;
}
