use tracing::instrument;

use crate::ports::spotify::{ApiError, PlaylistRef, SpotifyClient};
use crate::services::merge::MergeMode;
use crate::services::merge::collector::fetch_all_tracks;
use crate::services::merge::error::MergeError;
use crate::services::merge::identity::TrackIdentitySet;

pub const DEFAULT_PLAYLIST_NAME: &str = "Sphuffle";

pub fn playlist_description(source_count: usize) -> String {
    format!(
        "Combined from {} playlists - Created with Sphuffle",
        source_count
    )
}

/// The playlist a merge writes into, with its state before any mutation.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub playlist: PlaylistRef,
    pub identities: TrackIdentitySet,
    /// Track entries the playlist held when read, duplicates included.
    pub original_count: usize,
    pub mode: MergeMode,
}

pub struct TargetResolver<'a, C: SpotifyClient + ?Sized> {
    client: &'a C,
    user_id: &'a str,
    playlist_name: &'a str,
}

impl<'a, C: SpotifyClient + ?Sized> TargetResolver<'a, C> {
    pub fn new(client: &'a C, user_id: &'a str, playlist_name: &'a str) -> Self {
        Self {
            client,
            user_id,
            playlist_name,
        }
    }

    /// Reads `target_id` when given (update), otherwise creates a new
    /// playlist for the current user (create).
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        target_id: Option<&str>,
        source_count: usize,
    ) -> Result<ResolvedTarget, MergeError> {
        match target_id {
            Some(id) => self.read_existing(id).await,
            None => self.create(source_count).await,
        }
    }

    /// Reads an existing playlist and its current tracks. Only playlists
    /// owned by the current user can be merge targets.
    pub async fn read_existing(&self, target_id: &str) -> Result<ResolvedTarget, MergeError> {
        let playlist = self
            .client
            .playlist(target_id)
            .await
            .map_err(|e| MergeError::lookup(target_id, e))?;

        if playlist.owner_id != self.user_id {
            return Err(MergeError::validation(format!(
                "playlist '{}' ({}) is owned by {}, only your own playlists can be updated",
                playlist.name, playlist.id, playlist.owner_id
            )));
        }

        let tracks = fetch_all_tracks(self.client, target_id)
            .await
            .map_err(|e| MergeError::lookup(target_id, e))?;
        let identities: TrackIdentitySet = tracks.iter().map(|t| t.uri.as_str()).collect();

        tracing::info!(
            "Updating existing playlist '{}' ({}) with {} tracks",
            playlist.name,
            playlist.id,
            tracks.len()
        );

        Ok(ResolvedTarget {
            playlist,
            identities,
            original_count: tracks.len(),
            mode: MergeMode::Update,
        })
    }

    async fn create(&self, source_count: usize) -> Result<ResolvedTarget, MergeError> {
        let description = playlist_description(source_count);
        let playlist = self
            .client
            .create_playlist(self.user_id, self.playlist_name, &description)
            .await
            .map_err(|e| match e {
                ApiError::Unauthorized { status } => MergeError::Auth { status },
                other => MergeError::Creation {
                    reason: other.to_string(),
                },
            })?;

        if playlist.id.is_empty() {
            return Err(MergeError::Creation {
                reason: "response did not include a playlist id".to_string(),
            });
        }

        tracing::info!(
            "Created playlist '{}' ({}) from {} playlists",
            playlist.name,
            playlist.id,
            source_count
        );

        Ok(ResolvedTarget {
            playlist,
            identities: TrackIdentitySet::new(),
            original_count: 0,
            mode: MergeMode::Create,
        })
    }
}
