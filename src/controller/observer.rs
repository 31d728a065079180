//! Track-change detection and the detection cycle

use crate::model::TrackId;

use super::GroupController;
use super::expander::{self, ExpansionReport};
use super::matcher::{self, GroupMatch};

/// Last observed track. One per controller, so independent controllers never
/// share detection state.
#[derive(Debug, Default)]
pub struct ObserverState {
    last_track: Option<TrackId>,
}

impl ObserverState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn last_track(&self) -> Option<&TrackId> {
        self.last_track.as_ref()
    }

    /// Records `current` and returns it if it differs from the last observed
    /// track. "Nothing playing" leaves the state untouched.
    pub fn observe(&mut self, current: Option<TrackId>) -> Option<TrackId> {
        let track = current?;
        if self.last_track.as_ref() == Some(&track) {
            return None;
        }
        self.last_track = Some(track.clone());
        Some(track)
    }

    /// Puts back the track recorded before an unfinished cycle, so the same
    /// transition is detected again next time.
    pub fn restore(&mut self, previous: Option<TrackId>) {
        self.last_track = previous;
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Another cycle was still running; this tick was skipped
    Busy,
    PollFailed,
    NothingPlaying,
    Unchanged,
    Changed { track: TrackId, outcome: TrackOutcome },
}

impl CycleOutcome {
    pub fn expanded(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Changed {
                outcome: TrackOutcome::Expanded(_),
                ..
            }
        )
    }
}

#[derive(Debug)]
pub enum TrackOutcome {
    StoreUnavailable,
    NotGrouped,
    GroupMember,
    /// Head of a group with nothing after it
    NothingToQueue,
    Expanded(ExpansionReport),
}

impl GroupController {
    /// One poll-mode detection cycle.
    pub async fn poll_once(&self) -> CycleOutcome {
        let Ok(mut observer) = self.observer.try_lock() else {
            tracing::debug!("Previous detection cycle still running, skipping tick");
            return CycleOutcome::Busy;
        };

        let current = match self.api.currently_playing().await {
            Ok(current) => current,
            Err(e) if e.is_auth() => {
                tracing::error!(error = %e, "Authentication failed while polling, retrying next tick");
                return CycleOutcome::PollFailed;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to query currently playing track");
                return CycleOutcome::PollFailed;
            }
        };

        self.detect(&mut observer, current).await
    }

    /// One push-mode detection cycle. Waits for a running cycle to finish.
    pub async fn observe_track(&self, current: Option<TrackId>) -> CycleOutcome {
        let mut observer = self.observer.lock().await;
        self.detect(&mut observer, current).await
    }

    async fn detect(&self, observer: &mut ObserverState, current: Option<TrackId>) -> CycleOutcome {
        if current.is_none() {
            tracing::trace!("No track is currently playing");
            return CycleOutcome::NothingPlaying;
        }

        let previous = observer.last_track.clone();
        let Some(track) = observer.observe(current) else {
            return CycleOutcome::Unchanged;
        };

        tracing::info!(track_id = %track, "Detected track change");
        let outcome = self.handle_track_change(&track).await;
        if matches!(outcome, TrackOutcome::StoreUnavailable) {
            observer.restore(previous);
        }
        CycleOutcome::Changed { track, outcome }
    }

    async fn handle_track_change(&self, track: &TrackId) -> TrackOutcome {
        let groups = match self.store.read_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load groups");
                return TrackOutcome::StoreUnavailable;
            }
        };

        match matcher::match_track(groups.all_groups(), track) {
            GroupMatch::NotGrouped => {
                tracing::debug!(track_id = %track, "Track is not part of any group");
                TrackOutcome::NotGrouped
            }
            GroupMatch::Member(_) => {
                tracing::debug!(track_id = %track, "Track is grouped but not a group head");
                TrackOutcome::GroupMember
            }
            GroupMatch::Head(group) if group.tail().is_empty() => TrackOutcome::NothingToQueue,
            GroupMatch::Head(group) => {
                tracing::info!(track_id = %track, remaining = group.tail().len(), "Track heads a group, enqueuing the rest");
                let report = expander::expand_queue(self.api.as_ref(), group.tail()).await;
                self.announce(&report);
                TrackOutcome::Expanded(report)
            }
        }
    }
}
