//! In-memory fakes for the controller seams

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::GroupController;
use crate::config;
use crate::model::{
    ApiError, Group, GroupMap, GroupStore, PlaylistId, PlaylistSummary, SpotifyApi, TrackId,
    TrackSummary,
};
use crate::notify::testing::RecordingNotifier;

#[derive(Default)]
struct FakeSpotifyInner {
    playing: Mutex<VecDeque<Result<Option<TrackId>, ApiError>>>,
    failing: Mutex<HashSet<TrackId>>,
    enqueued: Mutex<Vec<TrackId>>,
    playlists: Mutex<Vec<(PlaylistSummary, Vec<TrackSummary>)>>,
    search_hits: Mutex<Vec<(String, String, TrackId)>>,
}

/// Scripted `SpotifyApi`. Clones share state, so a test keeps one handle
/// while the controller owns another.
#[derive(Clone, Default)]
pub struct FakeSpotify {
    inner: Arc<FakeSpotifyInner>,
}

impl FakeSpotify {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers for successive "currently playing" queries. Once exhausted,
    /// nothing is playing.
    pub fn playing(self, tracks: &[Option<&str>]) -> Self {
        self.inner
            .playing
            .lock()
            .unwrap()
            .extend(tracks.iter().map(|t| Ok(t.map(TrackId::new))));
        self
    }

    pub fn playing_results(self, results: Vec<Result<Option<TrackId>, ApiError>>) -> Self {
        self.inner.playing.lock().unwrap().extend(results);
        self
    }

    pub fn failing_on(self, tracks: &[&str]) -> Self {
        self.inner
            .failing
            .lock()
            .unwrap()
            .extend(tracks.iter().map(|t| TrackId::new(*t)));
        self
    }

    pub fn with_playlist(self, id: &str, name: &str, tracks: &[&str]) -> Self {
        let summary = PlaylistSummary {
            id: PlaylistId::new(id),
            name: name.to_string(),
            owner: "tester".to_string(),
            total_tracks: tracks.len() as u32,
        };
        let tracks = tracks
            .iter()
            .map(|t| TrackSummary {
                id: TrackId::new(*t),
                name: format!("Song {t}"),
                artists: vec!["Artist".to_string()],
                album: "Album".to_string(),
            })
            .collect();
        self.inner.playlists.lock().unwrap().push((summary, tracks));
        self
    }

    pub fn with_search_hit(self, name: &str, artist: &str, track: &str) -> Self {
        self.inner.search_hits.lock().unwrap().push((
            name.to_string(),
            artist.to_string(),
            TrackId::new(track),
        ));
        self
    }

    /// Every enqueue call, failed ones included, in call order.
    pub fn enqueue_attempts(&self) -> Vec<TrackId> {
        self.inner.enqueued.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpotifyApi for FakeSpotify {
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok("fake-token".to_string())
    }

    async fn currently_playing(&self) -> Result<Option<TrackId>, ApiError> {
        self.inner.playing.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn enqueue(&self, track: &TrackId) -> Result<(), ApiError> {
        self.inner.enqueued.lock().unwrap().push(track.clone());
        if self.inner.failing.lock().unwrap().contains(track) {
            return Err(ApiError::Request(format!("enqueue {track} rejected")));
        }
        Ok(())
    }

    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>, ApiError> {
        Ok(self
            .inner
            .playlists
            .lock()
            .unwrap()
            .iter()
            .map(|(summary, _)| summary.clone())
            .collect())
    }

    async fn playlist_tracks(&self, playlist_id: &PlaylistId) -> Result<Vec<TrackSummary>, ApiError> {
        self.inner
            .playlists
            .lock()
            .unwrap()
            .iter()
            .find(|(summary, _)| &summary.id == playlist_id)
            .map(|(_, tracks)| tracks.clone())
            .ok_or_else(|| ApiError::Request(format!("playlist {playlist_id} not found")))
    }

    async fn search_track(&self, name: &str, artist: &str) -> Result<Option<TrackId>, ApiError> {
        Ok(self
            .inner
            .search_hits
            .lock()
            .unwrap()
            .iter()
            .find(|(n, a, _)| n == name && a == artist)
            .map(|(_, _, id)| id.clone()))
    }
}

#[derive(Default)]
struct MemoryGroupStoreInner {
    groups: Mutex<GroupMap>,
    reads: AtomicUsize,
    // Reads left to fail; writes fail while any remain
    failing_reads: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryGroupStore {
    inner: Arc<MemoryGroupStoreInner>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose reads and writes always fail.
    pub fn failing() -> Self {
        Self::new().failing_reads(usize::MAX)
    }

    /// Fails the next `count` reads, then recovers.
    pub fn failing_reads(self, count: usize) -> Self {
        self.fail_next_reads(count);
        self
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.inner.failing_reads.store(count, Ordering::SeqCst);
    }

    pub fn with_group(self, playlist: &str, tracks: &[&str]) -> Self {
        let group = Group::new(tracks.iter().map(|t| TrackId::new(*t)).collect()).unwrap();
        self.inner.groups.lock().unwrap().push(PlaylistId::new(playlist), group);
        self
    }

    /// Bypasses the minimum-length check, like hand-edited data on disk.
    pub fn with_raw_group(self, playlist: &str, tracks: &[&str]) -> Self {
        let group: Group = serde_json::from_value(serde_json::json!(tracks)).unwrap();
        self.inner.groups.lock().unwrap().push(PlaylistId::new(playlist), group);
        self
    }

    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> GroupMap {
        self.inner.groups.lock().unwrap().clone()
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn read_groups(&self) -> Result<GroupMap> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .inner
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(anyhow!("storage unavailable"));
        }
        Ok(self.inner.groups.lock().unwrap().clone())
    }

    async fn write_groups(&self, groups: &GroupMap) -> Result<()> {
        if self.inner.failing_reads.load(Ordering::SeqCst) > 0 {
            return Err(anyhow!("storage unavailable"));
        }
        *self.inner.groups.lock().unwrap() = groups.clone();
        Ok(())
    }
}

pub fn controller(
    api: FakeSpotify,
    store: MemoryGroupStore,
) -> (GroupController, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = GroupController::new(
        Arc::new(api),
        Arc::new(store),
        notifier.clone(),
        config::Notify::default(),
    );
    (controller, notifier)
}
