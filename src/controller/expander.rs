//! Queues the rest of a group behind its head

use crate::config::NotifyPolicy;
use crate::model::{ApiError, SpotifyApi, TrackId};

use super::GroupController;

#[derive(Debug, Default)]
pub struct ExpansionReport {
    pub queued: Vec<TrackId>,
    pub failed: Vec<(TrackId, ApiError)>,
}

impl ExpansionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.queued.len() + self.failed.len()
    }
}

/// Enqueues `tracks` one at a time, in order. The player's queue is order
/// sensitive, so calls are never issued concurrently. A failed track is
/// recorded and the rest are still attempted.
pub async fn expand_queue(api: &dyn SpotifyApi, tracks: &[TrackId]) -> ExpansionReport {
    let mut report = ExpansionReport::default();

    for track in tracks {
        match api.enqueue(track).await {
            Ok(()) => report.queued.push(track.clone()),
            Err(e) => {
                tracing::error!(track_id = %track, error = %e, "Failed to enqueue grouped track");
                report.failed.push((track.clone(), e));
            }
        }
    }

    tracing::info!(
        queued = report.queued.len(),
        failed = report.failed.len(),
        "Group expansion finished"
    );
    report
}

impl GroupController {
    pub(crate) fn announce(&self, report: &ExpansionReport) {
        if !report.is_complete() && self.notify.policy == NotifyPolicy::FullSuccess {
            tracing::debug!(failed = report.failed.len(), "Skipping notification for partial expansion");
            return;
        }

        let message = if report.is_complete() {
            "A group of songs has been queued to play in order.".to_string()
        } else {
            format!(
                "Queued {} of {} grouped songs; {} could not be queued.",
                report.queued.len(),
                report.attempted(),
                report.failed.len()
            )
        };
        self.notifier.notify(&self.notify.title, &message);
    }
}
