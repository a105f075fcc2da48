//! Reconciliation of a target playlist against a set of source playlists.
//!
//! A merge collects the deduplicated tracks of every source playlist, reads or
//! creates the target, computes which uris to add and (when syncing) remove,
//! and applies that plan in chunks of at most 100 uris. Spotify offers no
//! transactions, so a failure part-way leaves the applied chunks in place and
//! is reported through [`MergeFailure`] together with the progress made.

pub mod batch;
pub mod collector;
pub mod diff;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod target;

pub use batch::MAX_BATCH_SIZE;
pub use orchestrator::MergeOrchestrator;
pub use target::DEFAULT_PLAYLIST_NAME;

use crate::ports::spotify::PlaylistRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// A new playlist is created for the merge.
    Create,
    /// An existing playlist is updated in place.
    Update,
}

#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Source playlists in the order their tracks should appear.
    pub sources: Vec<PlaylistRef>,
    /// Existing playlist to update. `None` creates a new one.
    pub target_id: Option<String>,
    /// Remove target tracks that no source contains.
    pub sync: bool,
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub playlist_name: String,
    pub batch_size: usize,
    pub fetch_concurrency: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            playlist_name: DEFAULT_PLAYLIST_NAME.to_string(),
            batch_size: MAX_BATCH_SIZE,
            fetch_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub target: PlaylistRef,
    pub tracks_added: usize,
    pub tracks_removed: usize,
    /// Computed from the pre-merge count and the applied plan, not re-read.
    pub total_final_tracks: usize,
    pub mode: MergeMode,
    pub source_playlists_count: usize,
}
