use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::ports::spotify::{PlaylistRef, SpotifyClient};
use crate::services::merge::batch::BatchMutator;
use crate::services::merge::collector::{CollectedTracks, TrackCollector};
use crate::services::merge::diff::{ReconciliationPlan, compute_plan};
use crate::services::merge::error::{
    MergeError, MergeFailure, MergeProgress, MergeState, MutationKind,
};
use crate::services::merge::identity::TrackIdentitySet;
use crate::services::merge::target::TargetResolver;
use crate::services::merge::{MergeMode, MergeOptions, MergeRequest, MergeResult};

/// Bookkeeping for one run through the merge states.
#[derive(Debug)]
struct Run {
    state: MergeState,
    target: Option<PlaylistRef>,
    progress: MergeProgress,
}

impl Run {
    fn new() -> Self {
        Self {
            state: MergeState::CollectingSources,
            target: None,
            progress: MergeProgress::default(),
        }
    }

    /// Moves to `next` unless the run was cancelled in the meantime.
    fn enter(&mut self, next: MergeState, cancel: &CancellationToken) -> Result<(), MergeFailure> {
        if cancel.is_cancelled() {
            tracing::warn!("Merge cancelled before {}", next);
            return Err(self.fail(MergeError::Cancelled { applied_chunks: 0 }));
        }
        tracing::info!("Merge state: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Moves to `Failed`, recording the state the run failed in.
    fn fail(&mut self, error: MergeError) -> MergeFailure {
        tracing::error!(
            "Merge failed while {} (removed {}, added {}): {}",
            self.state,
            self.progress.removed,
            self.progress.added,
            error
        );
        let failed_in = std::mem::replace(&mut self.state, MergeState::Failed);
        MergeFailure {
            state: failed_in,
            target: self.target.clone(),
            progress: self.progress,
            error,
        }
    }
}

/// Read-only outcome of a merge, computed without touching the target.
#[derive(Debug, Clone)]
pub struct MergePreview {
    pub collected: CollectedTracks,
    /// `None` when the merge would create a new playlist.
    pub target: Option<PlaylistRef>,
    pub original_target_count: usize,
    pub mode: MergeMode,
    pub plan: ReconciliationPlan,
}

impl MergePreview {
    pub fn total_final_tracks(&self) -> usize {
        self.original_target_count - self.plan.to_remove.len() + self.plan.to_add.len()
    }
}

/// Drives a merge through collecting, resolving, diffing and applying.
///
/// Nothing is retried here; retrying reads is the transport's job, and a
/// failed mutation is reported with the progress made so the caller decides.
pub struct MergeOrchestrator<'a, C: SpotifyClient + ?Sized> {
    client: &'a C,
    user_id: String,
    options: MergeOptions,
}

impl<'a, C: SpotifyClient + ?Sized> MergeOrchestrator<'a, C> {
    pub fn new(client: &'a C, user_id: impl Into<String>, options: MergeOptions) -> Self {
        Self {
            client,
            user_id: user_id.into(),
            options,
        }
    }

    async fn collect_sources(&self, request: &MergeRequest) -> Result<CollectedTracks, MergeError> {
        let target_id = request.target_id.as_deref();
        if TrackCollector::<C>::source_playlists(&request.sources, target_id).is_empty() {
            return Err(MergeError::validation(
                "no source playlists selected besides the target",
            ));
        }

        let collected = TrackCollector::new(self.client, self.options.fetch_concurrency)
            .collect(&request.sources, target_id)
            .await?;

        if collected.identities.is_empty() {
            return Err(MergeError::validation(
                "no tracks found in the selected playlists",
            ));
        }

        Ok(collected)
    }

    #[instrument(
        skip(self, request, cancel),
        fields(target = ?request.target_id, sources = request.sources.len(), sync = request.sync)
    )]
    pub async fn run(
        &self,
        request: &MergeRequest,
        cancel: &CancellationToken,
    ) -> Result<MergeResult, MergeFailure> {
        let mut run = Run::new();

        run.enter(MergeState::CollectingSources, cancel)?;
        let collected = self
            .collect_sources(request)
            .await
            .map_err(|e| run.fail(e))?;
        let source_playlists_count = collected.sources.len();

        run.enter(MergeState::ResolvingTarget, cancel)?;
        let resolver = TargetResolver::new(self.client, &self.user_id, &self.options.playlist_name);
        let target = resolver
            .resolve(request.target_id.as_deref(), source_playlists_count)
            .await
            .map_err(|e| run.fail(e))?;
        run.target = Some(target.playlist.clone());

        run.enter(MergeState::ComputingDiff, cancel)?;
        let plan = compute_plan(
            &collected.identities,
            &target.identities,
            request.sync,
            target.mode,
        );
        let mutator = BatchMutator::new(self.client, self.options.batch_size);
        if plan.is_empty() {
            tracing::info!("'{}' is already up to date", target.playlist.name);
        } else {
            tracing::info!(
                "Plan for '{}': {} to add, {} to remove, in chunks of {}",
                target.playlist.name,
                plan.to_add.len(),
                plan.to_remove.len(),
                mutator.batch_size()
            );
        }

        run.enter(MergeState::ApplyingRemovals, cancel)?;
        if !plan.to_remove.is_empty() {
            match mutator
                .apply(
                    &target.playlist.id,
                    MutationKind::Remove,
                    &plan.to_remove,
                    cancel,
                )
                .await
            {
                Ok(outcome) => run.progress.removed = outcome.items,
                Err(e) => {
                    run.progress.removed =
                        mutator.applied_items(e.applied_chunks(), plan.to_remove.len());
                    return Err(run.fail(e));
                }
            }
        }

        run.enter(MergeState::ApplyingAdditions, cancel)?;
        if !plan.to_add.is_empty() {
            match mutator
                .apply(&target.playlist.id, MutationKind::Add, &plan.to_add, cancel)
                .await
            {
                Ok(outcome) => run.progress.added = outcome.items,
                Err(e) => {
                    run.progress.added = mutator.applied_items(e.applied_chunks(), plan.to_add.len());
                    return Err(run.fail(e));
                }
            }
        }

        run.state = MergeState::Done;
        let result = MergeResult {
            target: target.playlist,
            tracks_added: run.progress.added,
            tracks_removed: run.progress.removed,
            total_final_tracks: target.original_count - run.progress.removed
                + run.progress.added,
            mode: target.mode,
            source_playlists_count,
        };

        tracing::info!(
            "Merge complete for '{}': {} added, {} removed, {} total",
            result.target.name,
            result.tracks_added,
            result.tracks_removed,
            result.total_final_tracks
        );

        Ok(result)
    }

    /// Collects, reads the target (if any) and diffs, without creating or
    /// mutating anything.
    #[instrument(
        skip(self, request, cancel),
        fields(target = ?request.target_id, sources = request.sources.len(), sync = request.sync)
    )]
    pub async fn preview(
        &self,
        request: &MergeRequest,
        cancel: &CancellationToken,
    ) -> Result<MergePreview, MergeFailure> {
        let mut run = Run::new();

        run.enter(MergeState::CollectingSources, cancel)?;
        let collected = self
            .collect_sources(request)
            .await
            .map_err(|e| run.fail(e))?;

        run.enter(MergeState::ResolvingTarget, cancel)?;
        let (target, identities, original_target_count, mode) = match &request.target_id {
            Some(id) => {
                let resolver =
                    TargetResolver::new(self.client, &self.user_id, &self.options.playlist_name);
                let resolved = resolver.read_existing(id).await.map_err(|e| run.fail(e))?;
                (
                    Some(resolved.playlist),
                    resolved.identities,
                    resolved.original_count,
                    resolved.mode,
                )
            }
            None => (None, TrackIdentitySet::new(), 0, MergeMode::Create),
        };

        run.enter(MergeState::ComputingDiff, cancel)?;
        let plan = compute_plan(&collected.identities, &identities, request.sync, mode);

        Ok(MergePreview {
            collected,
            target,
            original_target_count,
            mode,
            plan,
        })
    }
}
