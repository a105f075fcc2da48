use crate::ports::spotify::{ApiError, PlaylistRef, SpotifyClient, SpotifyUser};
use crate::services::merge::error::MergeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Followed,
}

#[derive(Debug, Clone)]
pub struct LibraryPlaylist {
    pub playlist: PlaylistRef,
    pub ownership: Ownership,
}

/// Read-only view of the current user's playlists.
pub struct LibraryService<'a, C: SpotifyClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: SpotifyClient + ?Sized> LibraryService<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    pub async fn current_user(&self) -> Result<SpotifyUser, ApiError> {
        self.client.current_user().await
    }

    /// All playlists in the user's library, following every page. Playlists
    /// owned by someone else are marked `Followed`.
    pub async fn list_playlists(&self, user_id: &str) -> Result<Vec<LibraryPlaylist>, ApiError> {
        let mut all_playlists = Vec::new();
        let mut cursor = None;

        loop {
            let page = self.client.user_playlists_page(user_id, cursor).await?;
            all_playlists.extend(page.items.into_iter().map(|playlist| {
                let ownership = if playlist.owner_id == user_id {
                    Ownership::Owned
                } else {
                    Ownership::Followed
                };
                LibraryPlaylist {
                    playlist,
                    ownership,
                }
            }));

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::debug!("Found {} playlists for {}", all_playlists.len(), user_id);
        Ok(all_playlists)
    }

    /// Resolves `ids` against the library, keeping the order of `ids`.
    /// Ids missing from the library are read individually, so playlists the
    /// user can access but does not follow still work as sources. Errors name
    /// the id that could not be read.
    pub async fn resolve_playlists(
        &self,
        library: &[LibraryPlaylist],
        ids: &[String],
    ) -> Result<Vec<PlaylistRef>, MergeError> {
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            match library.iter().find(|p| &p.playlist.id == id) {
                Some(entry) => resolved.push(entry.playlist.clone()),
                None => resolved.push(
                    self.client
                        .playlist(id)
                        .await
                        .map_err(|e| MergeError::lookup(id, e))?,
                ),
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::spotify::MockSpotifyClient;
    use crate::test_utils::{FakeSpotify, TEST_USER};

    #[tokio::test]
    async fn test_list_playlists_follows_pages_and_classifies() {
        let fake = FakeSpotify::new()
            .with_page_size(2)
            .with_playlist("mine1", TEST_USER, &["a"])
            .with_playlist("theirs", "other_user", &["b"])
            .with_playlist("mine2", TEST_USER, &[]);
        let service = LibraryService::new(&fake);

        let playlists = service.list_playlists(TEST_USER).await.unwrap();

        let summary: Vec<_> = playlists
            .iter()
            .map(|p| (p.playlist.id.as_str(), p.ownership))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("mine1", Ownership::Owned),
                ("theirs", Ownership::Followed),
                ("mine2", Ownership::Owned),
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_playlists_keeps_order_and_reads_unknown() {
        let fake = FakeSpotify::new()
            .with_playlist("p1", TEST_USER, &["a"])
            .with_playlist("p2", TEST_USER, &["b"]);
        let service = LibraryService::new(&fake);
        let library = vec![LibraryPlaylist {
            playlist: fake.playlist_ref("p1"),
            ownership: Ownership::Owned,
        }];

        let resolved = service
            .resolve_playlists(&library, &["p2".to_string(), "p1".to_string()])
            .await
            .unwrap();

        let ids: Vec<_> = resolved.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn test_resolve_playlists_names_missing_id() {
        let fake = FakeSpotify::new().with_playlist("p1", TEST_USER, &["a"]);
        let service = LibraryService::new(&fake);

        let error = service
            .resolve_playlists(&[], &["p1".to_string(), "ghost".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            MergeError::NotFound { ref playlist_id } if playlist_id == "ghost"
        ));
        assert!(error.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn test_resolve_playlists_server_error_names_id() {
        let mut client = MockSpotifyClient::new();
        client.expect_playlist().times(1).returning(|_| {
            Err(ApiError::Status {
                status: 500,
                body: "oops".into(),
            })
        });
        let service = LibraryService::new(&client);

        let error = service
            .resolve_playlists(&[], &["broken".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            MergeError::Fetch { ref playlist_id, .. } if playlist_id == "broken"
        ));
    }

    #[tokio::test]
    async fn test_list_playlists_propagates_errors() {
        let mut client = MockSpotifyClient::new();
        client
            .expect_user_playlists_page()
            .returning(|_, _| Err(ApiError::Unauthorized { status: 401 }));
        let service = LibraryService::new(&client);

        let result = service.list_playlists(TEST_USER).await;
        assert!(matches!(result, Err(ApiError::Unauthorized { status: 401 })));
    }
}
