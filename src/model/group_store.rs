//! Persisted playlist → groups mapping

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::types::{Group, PlaylistId, TrackId};

/// Groups saved for one playlist, in creation order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaylistGroups {
    pub playlist_id: PlaylistId,
    pub groups: Vec<Group>,
}

/// Mapping from playlist to its groups. Playlists keep the order in which
/// their first group was saved, which is also the order the matcher scans.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupMap(Vec<PlaylistGroups>);

impl GroupMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, playlist_id: PlaylistId, group: Group) {
        match self.0.iter_mut().find(|entry| entry.playlist_id == playlist_id) {
            Some(entry) => entry.groups.push(group),
            None => self.0.push(PlaylistGroups {
                playlist_id,
                groups: vec![group],
            }),
        }
    }

    pub fn groups_for(&self, playlist_id: &PlaylistId) -> &[Group] {
        self.0
            .iter()
            .find(|entry| &entry.playlist_id == playlist_id)
            .map(|entry| entry.groups.as_slice())
            .unwrap_or(&[])
    }

    /// Every group across all playlists, in storage iteration order.
    pub fn all_groups(&self) -> impl Iterator<Item = &Group> {
        self.0.iter().flat_map(|entry| entry.groups.iter())
    }

    /// Every grouped track id, flattened.
    pub fn grouped_tracks(&self) -> Vec<TrackId> {
        self.all_groups()
            .flat_map(|group| group.tracks().iter().cloned())
            .collect()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|entry| entry.groups.is_empty())
    }
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn read_groups(&self) -> Result<GroupMap>;

    async fn write_groups(&self, groups: &GroupMap) -> Result<()>;

    /// Appends `group` to the playlist's groups.
    async fn save_group(&self, playlist_id: PlaylistId, group: Group) -> Result<()> {
        let mut groups = self.read_groups().await?;
        groups.push(playlist_id, group);
        self.write_groups(&groups).await
    }
}

/// JSON file store under the cache directory
pub struct JsonGroupStore {
    path: PathBuf,
    // Serializes read-modify-write in save_group
    write_lock: Mutex<()>,
}

impl JsonGroupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn load(&self) -> Result<GroupMap> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No groups file yet");
                return Ok(GroupMap::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))
    }

    async fn store(&self, groups: &GroupMap) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        // Readers in other processes only ever see a complete file
        let content = serde_json::to_string_pretty(groups)?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, content)
            .await
            .with_context(|| format!("writing {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl GroupStore for JsonGroupStore {
    async fn read_groups(&self) -> Result<GroupMap> {
        self.load().await
    }

    async fn write_groups(&self, groups: &GroupMap) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store(groups).await
    }

    async fn save_group(&self, playlist_id: PlaylistId, group: Group) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut groups = self.load().await?;
        tracing::debug!(playlist_id = %playlist_id, tracks = group.len(), "Saving group");
        groups.push(playlist_id, group);
        self.store(&groups).await
    }
}
