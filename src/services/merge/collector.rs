use std::collections::HashSet;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::instrument;

use crate::ports::spotify::{ApiError, PlaylistRef, SpotifyClient, Track};
use crate::services::merge::error::MergeError;
use crate::services::merge::identity::TrackIdentitySet;

/// Fetch every track of a playlist, following `next` cursors until exhausted.
pub async fn fetch_all_tracks<C: SpotifyClient + ?Sized>(
    client: &C,
    playlist_id: &str,
) -> Result<Vec<Track>, ApiError> {
    let mut all_tracks = Vec::new();
    let mut cursor = None;

    loop {
        let page = client.playlist_tracks_page(playlist_id, cursor).await?;
        tracing::debug!(
            "Fetched {} tracks from playlist {} (more: {})",
            page.items.len(),
            playlist_id,
            page.next.is_some()
        );
        all_tracks.extend(page.items);

        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(all_tracks)
}

/// Tracks gathered from the source playlists of a merge.
#[derive(Debug, Clone, Default)]
pub struct CollectedTracks {
    pub identities: TrackIdentitySet,
    /// First occurrence of each uri, in identity order.
    pub tracks: Vec<Track>,
    /// Tracks examined before dedup.
    pub raw_count: usize,
    /// Source playlists actually traversed.
    pub sources: Vec<PlaylistRef>,
}

pub struct TrackCollector<'a, C: SpotifyClient + ?Sized> {
    client: &'a C,
    concurrency: usize,
}

impl<'a, C: SpotifyClient + ?Sized> TrackCollector<'a, C> {
    pub fn new(client: &'a C, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    /// Drops `exclude` and repeated ids from `playlists`, keeping caller order.
    pub fn source_playlists(playlists: &[PlaylistRef], exclude: Option<&str>) -> Vec<PlaylistRef> {
        let mut seen = HashSet::new();
        playlists
            .iter()
            .filter(|p| Some(p.id.as_str()) != exclude)
            .filter(|p| seen.insert(p.id.clone()))
            .cloned()
            .collect()
    }

    /// Collects the deduplicated tracks of `playlists`, skipping `exclude`.
    ///
    /// Up to `concurrency` playlists are fetched at once, but results are
    /// merged in the order of `playlists`, so the identity order never depends
    /// on which fetch finishes first. The first failing playlist (in that
    /// order) aborts the collection.
    #[instrument(skip(self, playlists), fields(playlists = playlists.len()))]
    pub async fn collect(
        &self,
        playlists: &[PlaylistRef],
        exclude: Option<&str>,
    ) -> Result<CollectedTracks, MergeError> {
        let sources = Self::source_playlists(playlists, exclude);
        if sources.len() < playlists.len() {
            tracing::debug!(
                "Skipping {} playlist(s) that are the target or repeated",
                playlists.len() - sources.len()
            );
        }

        let fetched: Vec<Vec<Track>> = stream::iter(sources.iter())
            .map(|playlist| async move {
                let tracks = fetch_all_tracks(self.client, &playlist.id)
                    .await
                    .map_err(|e| MergeError::fetch(&playlist.id, e))?;
                tracing::info!(
                    "Fetched {} tracks from '{}' ({})",
                    tracks.len(),
                    playlist.name,
                    playlist.id
                );
                Ok::<_, MergeError>(tracks)
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut collected = CollectedTracks {
            sources,
            ..CollectedTracks::default()
        };
        for track in fetched.into_iter().flatten() {
            collected.raw_count += 1;
            if collected.identities.insert(&track.uri) {
                collected.tracks.push(track);
            }
        }

        tracing::info!(
            "Collected {} unique tracks out of {} from {} playlist(s)",
            collected.identities.len(),
            collected.raw_count,
            collected.sources.len()
        );

        Ok(collected)
    }
}
