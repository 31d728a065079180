//! Core type definitions shared by the store, the client and the controller

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Spotify track id (base-62, without the `spotify:track:` prefix).
/// Deserializing accepts either form, so ids from hosts and from disk
/// always compare equal to the ones Spotify reports.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl<'de> Deserialize<'de> for TrackId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|raw| Self::parse(&raw))
    }
}

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accepts either a bare id or a `spotify:track:` URI.
    pub fn parse(raw: &str) -> Self {
        let id = raw.rsplit(':').next().unwrap_or(raw);
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(String);

impl PlaylistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaylistId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("a group needs at least {min} tracks, got {count}")]
    TooFewTracks { min: usize, count: usize },
}

/// Ordered run of tracks that should always play back-to-back.
///
/// Deserialization does not re-check the minimum length: whatever is on disk
/// is loaded as-is, and a group with nothing after its head simply never
/// expands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group(Vec<TrackId>);

impl Group {
    pub const MIN_TRACKS: usize = 2;

    pub fn new(tracks: Vec<TrackId>) -> Result<Self, GroupError> {
        if tracks.len() < Self::MIN_TRACKS {
            return Err(GroupError::TooFewTracks {
                min: Self::MIN_TRACKS,
                count: tracks.len(),
            });
        }
        Ok(Self(tracks))
    }

    pub fn head(&self) -> Option<&TrackId> {
        self.0.first()
    }

    /// Members following the head, in stored order.
    pub fn tail(&self) -> &[TrackId] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn contains(&self, track: &TrackId) -> bool {
        self.0.contains(track)
    }

    pub fn tracks(&self) -> &[TrackId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// A user's playlist as handed to the UI host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub name: String,
    pub owner: String,
    pub total_tracks: u32,
}

/// A playlist track as handed to the UI host for group authoring
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub id: TrackId,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
}
