use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::ports::spotify::SpotifyClient;
use crate::services::merge::error::{MergeError, MutationKind};

/// Hard cap Spotify enforces on uris per add/remove request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Outcome of a fully applied mutation list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub chunks: usize,
    pub items: usize,
}

/// Issues add/remove requests for one target playlist, one chunk at a time.
///
/// Chunks are sent strictly sequentially: the API has no concurrency token,
/// so overlapping writes to the same playlist could be lost or reordered.
pub struct BatchMutator<'a, C: SpotifyClient + ?Sized> {
    client: &'a C,
    batch_size: usize,
}

impl<'a, C: SpotifyClient + ?Sized> BatchMutator<'a, C> {
    /// `batch_size` is clamped to `1..=MAX_BATCH_SIZE`.
    pub fn new(client: &'a C, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Uris already applied once `applied_chunks` chunks of a `total`-long
    /// list went through. Every chunk but the last is full.
    pub fn applied_items(&self, applied_chunks: usize, total: usize) -> usize {
        (applied_chunks * self.batch_size).min(total)
    }

    /// Applies `uris` to `playlist_id` in order.
    ///
    /// Stops at the first failing chunk; chunks sent before it stay applied.
    /// The cancellation token is checked before each chunk.
    #[instrument(skip(self, uris, cancel), fields(uris = uris.len()))]
    pub async fn apply(
        &self,
        playlist_id: &str,
        kind: MutationKind,
        uris: &[String],
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, MergeError> {
        let total_chunks = uris.len().div_ceil(self.batch_size);
        let mut outcome = BatchOutcome::default();

        for (index, chunk) in uris.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    "Cancelled after {} of {} {} chunk(s) on playlist {}",
                    outcome.chunks,
                    total_chunks,
                    kind,
                    playlist_id
                );
                return Err(MergeError::Cancelled {
                    applied_chunks: outcome.chunks,
                });
            }

            let result = match kind {
                MutationKind::Add => self.client.add_tracks(playlist_id, chunk).await,
                MutationKind::Remove => self.client.remove_tracks(playlist_id, chunk).await,
            };

            if let Err(source) = result {
                tracing::error!(
                    "Failed to {} chunk {}/{} on playlist {}: {}",
                    kind,
                    index + 1,
                    total_chunks,
                    playlist_id,
                    source
                );
                return Err(MergeError::BatchMutation {
                    kind,
                    chunk_index: index + 1,
                    applied_chunks: outcome.chunks,
                    source,
                });
            }

            outcome.chunks += 1;
            outcome.items += chunk.len();
            tracing::info!(
                "Applied {} chunk {}/{} ({} tracks) to playlist {}",
                kind,
                index + 1,
                total_chunks,
                chunk.len(),
                playlist_id
            );
        }

        Ok(outcome)
    }
}
