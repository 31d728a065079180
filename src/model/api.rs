//! Seam between the controller and the Spotify Web API

use async_trait::async_trait;
use rspotify::ClientError;
use rspotify::http::HttpError;
use thiserror::Error;

use super::types::{PlaylistId, PlaylistSummary, TrackId, TrackSummary};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Token missing, expired or rejected. The next call re-attempts auth.
    #[error("authentication failed: {0}")]
    Unauthorized(String),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match &err {
            ClientError::InvalidToken => ApiError::Unauthorized(err.to_string()),
            ClientError::Http(http) => match http.as_ref() {
                HttpError::StatusCode(response) if response.status().as_u16() == 401 => {
                    ApiError::Unauthorized(err.to_string())
                }
                _ => ApiError::Request(err.to_string()),
            },
            _ => ApiError::Request(err.to_string()),
        }
    }
}

impl From<rspotify::model::IdError> for ApiError {
    fn from(err: rspotify::model::IdError) -> Self {
        ApiError::InvalidId(err.to_string())
    }
}

/// Operations the group controller needs from the streaming service
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    /// Current bearer token, refreshed first if it is close to expiry.
    async fn access_token(&self) -> Result<String, ApiError>;

    /// The track currently playing, or `None` when nothing (or a non-track
    /// item) is playing.
    async fn currently_playing(&self) -> Result<Option<TrackId>, ApiError>;

    /// Appends a track to the active device's play queue.
    async fn enqueue(&self, track: &TrackId) -> Result<(), ApiError>;

    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>, ApiError>;

    async fn playlist_tracks(&self, playlist_id: &PlaylistId) -> Result<Vec<TrackSummary>, ApiError>;

    /// Best search hit for a track name and artist.
    async fn search_track(&self, name: &str, artist: &str) -> Result<Option<TrackId>, ApiError>;
}
