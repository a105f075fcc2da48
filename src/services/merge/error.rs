use std::fmt;

use crate::ports::spotify::{ApiError, PlaylistRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Remove,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Add => write!(f, "add"),
            MutationKind::Remove => write!(f, "remove"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Failed to fetch tracks of playlist {playlist_id}: {source}")]
    Fetch {
        playlist_id: String,
        #[source]
        source: ApiError,
    },
    #[error("Playlist {playlist_id} not found or not accessible")]
    NotFound { playlist_id: String },
    #[error("Failed to create playlist: {reason}")]
    Creation { reason: String },
    #[error(
        "Failed to {kind} tracks in chunk {chunk_index} ({applied_chunks} chunk(s) already applied): {source}"
    )]
    BatchMutation {
        kind: MutationKind,
        /// 1-based index of the chunk that failed.
        chunk_index: usize,
        applied_chunks: usize,
        #[source]
        source: ApiError,
    },
    #[error("Invalid merge request: {reason}")]
    Validation { reason: String },
    #[error("Spotify rejected the credentials (HTTP {status})")]
    Auth { status: u16 },
    #[error("Merge cancelled ({applied_chunks} chunk(s) of the current step already applied)")]
    Cancelled { applied_chunks: usize },
}

impl MergeError {
    /// Wraps a read failure for `playlist_id`, surfacing credential
    /// rejections as `Auth`.
    pub fn fetch(playlist_id: &str, error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized { status } => MergeError::Auth { status },
            source => MergeError::Fetch {
                playlist_id: playlist_id.to_string(),
                source,
            },
        }
    }

    /// Like [`MergeError::fetch`], but a missing playlist becomes `NotFound`.
    pub fn lookup(playlist_id: &str, error: ApiError) -> Self {
        match error {
            ApiError::NotFound => MergeError::NotFound {
                playlist_id: playlist_id.to_string(),
            },
            other => MergeError::fetch(playlist_id, other),
        }
    }

    /// Whether the failure was a rejected credential, including one hit
    /// mid-batch.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            MergeError::Auth { .. }
                | MergeError::BatchMutation {
                    source: ApiError::Unauthorized { .. },
                    ..
                }
        )
    }

    /// Chunks of the interrupted mutation that went through before the error.
    pub fn applied_chunks(&self) -> usize {
        match self {
            MergeError::BatchMutation { applied_chunks, .. }
            | MergeError::Cancelled { applied_chunks } => *applied_chunks,
            _ => 0,
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        MergeError::Validation {
            reason: reason.into(),
        }
    }
}

/// States of a merge run. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    CollectingSources,
    ResolvingTarget,
    ComputingDiff,
    ApplyingRemovals,
    ApplyingAdditions,
    Done,
    Failed,
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeState::CollectingSources => "collecting source tracks",
            MergeState::ResolvingTarget => "resolving the target playlist",
            MergeState::ComputingDiff => "computing the diff",
            MergeState::ApplyingRemovals => "removing tracks",
            MergeState::ApplyingAdditions => "adding tracks",
            MergeState::Done => "done",
            MergeState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Tracks already mutated on the remote side when a run stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeProgress {
    pub removed: usize,
    pub added: usize,
}

/// A merge that reached `Failed`. Mutations counted in `progress` stay applied
/// on `target`; nothing is rolled back.
#[derive(Debug, thiserror::Error)]
#[error("Merge failed while {state}: {error}")]
pub struct MergeFailure {
    /// The state the run was in when it failed.
    pub state: MergeState,
    pub target: Option<PlaylistRef>,
    pub progress: MergeProgress,
    #[source]
    pub error: MergeError,
}
