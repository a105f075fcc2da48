use std::sync::Arc;

use crate::ports::auth::TokenProvider;
use crate::ports::spotify::{ApiError, Page, PlaylistRef, SpotifyClient, SpotifyUser, Track};
use crate::spotify_rs::client::{SpotifyClient as SpotifyHttpClient, SpotifyClientOptions};
use crate::spotify_rs::types::{Paging, PlaylistTrackObject, SpotifyPlaylist};

pub struct SpotifyHttpAdapter {
    client: SpotifyHttpClient,
}

impl SpotifyHttpAdapter {
    pub fn new(tokens: Arc<dyn TokenProvider>, options: SpotifyClientOptions) -> Self {
        Self {
            client: SpotifyHttpClient::new(tokens, options),
        }
    }
}

fn to_playlist_ref(playlist: SpotifyPlaylist) -> PlaylistRef {
    PlaylistRef {
        id: playlist.id,
        name: playlist.name,
        owner_id: playlist.owner.id,
        track_count: playlist.tracks.map(|t| t.total).unwrap_or(0),
    }
}

/// Drops items without a playable track uri (removed tracks, null entries).
fn to_tracks_page(paging: Paging<PlaylistTrackObject>) -> Page<Track> {
    let items = paging
        .items
        .into_iter()
        .filter_map(|item| item.track)
        .filter_map(|track| match track.uri {
            Some(uri) if !uri.is_empty() => Some(Track {
                uri,
                name: track.name,
                artists: track.artists.into_iter().map(|a| a.name).collect(),
            }),
            _ => {
                tracing::warn!("Skipping playlist item without uri: '{}'", track.name);
                None
            }
        })
        .collect();

    Page {
        items,
        next: paging.next,
    }
}

#[async_trait::async_trait]
impl SpotifyClient for SpotifyHttpAdapter {
    async fn current_user(&self) -> Result<SpotifyUser, ApiError> {
        let user = self.client.get_current_user().await?;
        Ok(SpotifyUser {
            id: user.id,
            display_name: user.display_name,
        })
    }

    async fn user_playlists_page(
        &self,
        user_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<PlaylistRef>, ApiError> {
        let paging = self
            .client
            .get_user_playlists_page(user_id, cursor.as_deref())
            .await?;

        Ok(Page {
            items: paging.items.into_iter().map(to_playlist_ref).collect(),
            next: paging.next,
        })
    }

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistRef, ApiError> {
        Ok(to_playlist_ref(self.client.get_playlist(playlist_id).await?))
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<Track>, ApiError> {
        let paging = self
            .client
            .get_playlist_tracks_page(playlist_id, cursor.as_deref())
            .await?;
        Ok(to_tracks_page(paging))
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> Result<PlaylistRef, ApiError> {
        let created = self
            .client
            .create_playlist(user_id, name, description)
            .await?;
        Ok(to_playlist_ref(created))
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), ApiError> {
        self.client.add_tracks(playlist_id, uris).await
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), ApiError> {
        self.client.remove_tracks(playlist_id, uris).await
    }
}
