use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::ports::spotify::{ApiError, Page, PlaylistRef, SpotifyClient, SpotifyUser, Track};

pub const TEST_USER: &str = "test_user";

/// A mutation request as received by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Add { playlist_id: String, uris: Vec<String> },
    Remove { playlist_id: String, uris: Vec<String> },
}

#[derive(Debug, Default)]
struct State {
    playlists: Vec<PlaylistRef>,
    tracks: HashMap<String, Vec<String>>,
    created: usize,
    add_calls: usize,
    calls: Vec<Call>,
    pages_served: HashMap<String, usize>,
}

/// In-memory Spotify that paginates, records mutations and can be told to
/// fail specific requests.
pub struct FakeSpotify {
    page_size: usize,
    state: Mutex<State>,
    failing_fetches: HashSet<String>,
    failing_add_call: Option<usize>,
    fail_create: bool,
    cancel_on_add: Option<(usize, CancellationToken)>,
}

pub fn uris(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl FakeSpotify {
    pub fn new() -> Self {
        Self {
            page_size: 100,
            state: Mutex::new(State::default()),
            failing_fetches: HashSet::new(),
            failing_add_call: None,
            fail_create: false,
            cancel_on_add: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_playlist(self, id: &str, owner_id: &str, tracks: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.playlists.push(PlaylistRef {
                id: id.to_string(),
                name: format!("Playlist {}", id),
                owner_id: owner_id.to_string(),
                track_count: tracks.len() as u32,
            });
            state.tracks.insert(id.to_string(), uris(tracks));
        }
        self
    }

    /// Every tracks request for `playlist_id` fails with HTTP 500.
    pub fn failing_fetch(mut self, playlist_id: &str) -> Self {
        self.failing_fetches.insert(playlist_id.to_string());
        self
    }

    /// The `call`-th add request (1-based) fails with HTTP 502.
    pub fn failing_add_call(mut self, call: usize) -> Self {
        self.failing_add_call = Some(call);
        self
    }

    /// Cancels `token` once the `call`-th add request (1-based) has been applied.
    pub fn cancelling_after_add(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on_add = Some((call, token));
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn playlist_ref(&self, id: &str) -> PlaylistRef {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .unwrap_or_else(|| panic!("no playlist {}", id))
    }

    pub fn tracks_of(&self, id: &str) -> Vec<String> {
        self.state.lock().unwrap().tracks[id].clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn pages_served(&self, id: &str) -> usize {
        *self.state.lock().unwrap().pages_served.get(id).unwrap_or(&0)
    }

    pub fn created_playlists(&self) -> usize {
        self.state.lock().unwrap().created
    }

    fn paginate<T: Clone>(&self, items: &[T], cursor: Option<String>) -> Page<T> {
        let offset: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (offset + self.page_size).min(items.len());
        Page {
            items: items[offset..end].to_vec(),
            next: (end < items.len()).then(|| end.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl SpotifyClient for FakeSpotify {
    async fn current_user(&self) -> Result<SpotifyUser, ApiError> {
        Ok(SpotifyUser {
            id: TEST_USER.to_string(),
            display_name: Some("Test User".to_string()),
        })
    }

    async fn user_playlists_page(
        &self,
        _user_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<PlaylistRef>, ApiError> {
        let playlists = self.state.lock().unwrap().playlists.clone();
        Ok(self.paginate(&playlists, cursor))
    }

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistRef, ApiError> {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .iter()
            .find(|p| p.id == playlist_id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<Track>, ApiError> {
        if self.failing_fetches.contains(playlist_id) {
            return Err(ApiError::Status {
                status: 500,
                body: "internal error".into(),
            });
        }

        let tracks = {
            let mut state = self.state.lock().unwrap();
            *state
                .pages_served
                .entry(playlist_id.to_string())
                .or_default() += 1;
            state
                .tracks
                .get(playlist_id)
                .cloned()
                .ok_or(ApiError::NotFound)?
        };

        let tracks: Vec<Track> = tracks
            .into_iter()
            .map(|uri| Track {
                name: uri.clone(),
                uri,
                artists: vec!["Artist".to_string()],
            })
            .collect();
        Ok(self.paginate(&tracks, cursor))
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        _description: &str,
    ) -> Result<PlaylistRef, ApiError> {
        if self.fail_create {
            return Err(ApiError::Status {
                status: 500,
                body: "create failed".into(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.created += 1;
        let playlist = PlaylistRef {
            id: format!("created{}", state.created),
            name: name.to_string(),
            owner_id: user_id.to_string(),
            track_count: 0,
        };
        state.playlists.push(playlist.clone());
        state.tracks.insert(playlist.id.clone(), Vec::new());
        Ok(playlist)
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), ApiError> {
        assert!(uris.len() <= 100, "add request exceeds 100 uris");
        let mut state = self.state.lock().unwrap();
        state.add_calls += 1;
        state.calls.push(Call::Add {
            playlist_id: playlist_id.to_string(),
            uris: uris.to_vec(),
        });

        if self.failing_add_call == Some(state.add_calls) {
            return Err(ApiError::Status {
                status: 502,
                body: "bad gateway".into(),
            });
        }

        state
            .tracks
            .get_mut(playlist_id)
            .ok_or(ApiError::NotFound)?
            .extend(uris.iter().cloned());

        if let Some((call, token)) = &self.cancel_on_add
            && *call == state.add_calls
        {
            token.cancel();
        }
        Ok(())
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), ApiError> {
        assert!(uris.len() <= 100, "remove request exceeds 100 uris");
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Remove {
            playlist_id: playlist_id.to_string(),
            uris: uris.to_vec(),
        });

        state
            .tracks
            .get_mut(playlist_id)
            .ok_or(ApiError::NotFound)?
            .retain(|uri| !uris.contains(uri));
        Ok(())
    }
}
