//! Typed request/response contract for UI hosts
//!
//! Every request kind has exactly one success response shape; any failure is
//! answered with [`Response::Error`]. On the wire both are JSON objects
//! tagged by `type`, with camelCase fields.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::{Group, PlaylistId, PlaylistSummary, TrackId, TrackSummary};

use super::GroupController;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Request {
    GetAccessToken,
    FetchPlaylists,
    FetchTracks {
        playlist_id: PlaylistId,
    },
    SaveGroup {
        playlist_id: PlaylistId,
        track_ids: Vec<TrackId>,
    },
    GetGroups {
        playlist_id: PlaylistId,
    },
    GetGroupedSongs,
    ResolveTrack {
        track_name: String,
        artist_name: String,
    },
    /// Push-mode playback event; `null` means nothing is playing
    CurrentTrack {
        track_id: Option<TrackId>,
    },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::GetAccessToken => "GET_ACCESS_TOKEN",
            Request::FetchPlaylists => "FETCH_PLAYLISTS",
            Request::FetchTracks { .. } => "FETCH_TRACKS",
            Request::SaveGroup { .. } => "SAVE_GROUP",
            Request::GetGroups { .. } => "GET_GROUPS",
            Request::GetGroupedSongs => "GET_GROUPED_SONGS",
            Request::ResolveTrack { .. } => "RESOLVE_TRACK",
            Request::CurrentTrack { .. } => "CURRENT_TRACK",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Response {
    AccessToken { access_token: String },
    Playlists { playlists: Vec<PlaylistSummary> },
    Tracks { tracks: Vec<TrackSummary> },
    GroupSaved { success: bool },
    Groups { groups: Vec<Group> },
    GroupedSongs { grouped_songs: Vec<TrackId> },
    TrackResolved { track_id: Option<TrackId> },
    TrackObserved { changed: bool, expanded: bool },
    /// Unsolicited; written by the run loop, never returned by `dispatch`
    Notification { title: String, message: String },
    Error { error: String },
}

pub fn parse_request(line: &str) -> Result<Request, serde_json::Error> {
    serde_json::from_str(line)
}

impl GroupController {
    /// Single entry point for every request kind.
    pub async fn dispatch(&self, request: Request) -> Response {
        let kind = request.kind();
        tracing::debug!(request = kind, "Received request");

        match self.route(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(request = kind, error = %e, "Request failed");
                Response::Error {
                    error: format!("{e:#}"),
                }
            }
        }
    }

    async fn route(&self, request: Request) -> Result<Response> {
        let response = match request {
            Request::GetAccessToken => Response::AccessToken {
                access_token: self.api.access_token().await?,
            },
            Request::FetchPlaylists => Response::Playlists {
                playlists: self.api.user_playlists().await?,
            },
            Request::FetchTracks { playlist_id } => Response::Tracks {
                tracks: self.api.playlist_tracks(&playlist_id).await?,
            },
            Request::SaveGroup {
                playlist_id,
                track_ids,
            } => {
                let group = Group::new(track_ids)?;
                self.store.save_group(playlist_id.clone(), group).await?;
                tracing::info!(playlist_id = %playlist_id, "Saved group");
                Response::GroupSaved { success: true }
            }
            Request::GetGroups { playlist_id } => {
                let groups = self.store.read_groups().await?;
                Response::Groups {
                    groups: groups.groups_for(&playlist_id).to_vec(),
                }
            }
            Request::GetGroupedSongs => Response::GroupedSongs {
                grouped_songs: self.store.read_groups().await?.grouped_tracks(),
            },
            Request::ResolveTrack {
                track_name,
                artist_name,
            } => Response::TrackResolved {
                track_id: self.api.search_track(&track_name, &artist_name).await?,
            },
            Request::CurrentTrack { track_id } => {
                let outcome = self.observe_track(track_id).await;
                if let super::CycleOutcome::Changed { track, .. } = &outcome {
                    tracing::debug!(track_id = %track, expanded = outcome.expanded(), "Host reported a new track");
                }
                Response::TrackObserved {
                    changed: matches!(outcome, super::CycleOutcome::Changed { .. }),
                    expanded: outcome.expanded(),
                }
            }
        };
        Ok(response)
    }
}
