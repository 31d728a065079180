//! Spotify Web API client wrapper with token refresh support

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use rspotify::{
    model::{PlayableId, PlayableItem, PlaylistId as SpotifyPlaylistId, SearchResult, SearchType, TrackId as SpotifyTrackId},
    prelude::*,
    AuthCodeSpotify, Config, Token,
};
use tokio::sync::RwLock;

use super::api::{ApiError, SpotifyApi};
use super::types::{PlaylistId, PlaylistSummary, TrackId, TrackSummary};
use crate::auth::{self, AuthResult};
use crate::config;

struct TokenState {
    access_token: String,
    refresh_token: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Spotify API client that refreshes its own bearer token
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
    token: Arc<RwLock<TokenState>>,
    auth_config: config::Auth,
    storage: config::Storage,
}

impl SpotifyClient {
    pub async fn connect(
        auth_result: AuthResult,
        auth_config: config::Auth,
        storage: config::Storage,
    ) -> Result<Self> {
        let spotify = AuthCodeSpotify::with_config(
            Default::default(),
            Default::default(),
            Config {
                token_cached: false,
                token_refreshing: false,
                ..Default::default()
            },
        );
        tracing::debug!("rspotify client initialized");

        let client = Self {
            client: Arc::new(spotify),
            token: Arc::new(RwLock::new(TokenState {
                access_token: String::new(),
                refresh_token: String::new(),
                expires_at: None,
            })),
            auth_config,
            storage,
        };
        client.install_token(auth_result).await?;
        Ok(client)
    }

    async fn install_token(&self, result: AuthResult) -> Result<()> {
        let token = Token {
            access_token: result.access_token.clone(),
            expires_in: chrono::Duration::seconds((result.expires_at - Utc::now()).num_seconds().max(0)),
            expires_at: Some(result.expires_at),
            scopes: auth::SCOPES
                .split_whitespace()
                .map(|s| s.to_string())
                .collect::<HashSet<String>>(),
            refresh_token: None,
        };

        *self
            .client
            .token
            .lock()
            .await
            .map_err(|_| anyhow::anyhow!("rspotify token lock is unavailable"))? = Some(token);

        let mut state = self.token.write().await;
        state.access_token = result.access_token;
        state.refresh_token = result.refresh_token;
        state.expires_at = Some(result.expires_at);
        tracing::debug!(expires_at = %result.expires_at, "Access token installed");
        Ok(())
    }

    pub async fn token_needs_refresh(&self) -> bool {
        let state = self.token.read().await;
        match state.expires_at {
            Some(exp) => {
                let remaining = exp - Utc::now();
                remaining.num_seconds() < self.auth_config.refresh_margin_secs
            }
            None => true,
        }
    }

    /// Forces the next call to re-authenticate.
    pub async fn invalidate_token(&self) {
        self.token.write().await.expires_at = None;
    }

    pub async fn refresh_token_if_needed(&self) -> Result<bool, ApiError> {
        if !self.token_needs_refresh().await {
            return Ok(false);
        }

        let refresh_token = self.token.read().await.refresh_token.clone();
        tracing::info!("Token expiring soon, refreshing...");

        let result = auth::refresh_access_token(&self.auth_config, &self.storage, &refresh_token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to refresh token");
                ApiError::Unauthorized(e.to_string())
            })?;
        self.install_token(result)
            .await
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        tracing::info!("Token refreshed successfully");
        Ok(true)
    }

    /// Invalidates the token when Spotify rejects it, so the next cycle
    /// re-authenticates instead of retrying a dead token.
    async fn check<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result {
            if e.is_auth() {
                tracing::warn!(error = %e, "Spotify rejected the access token");
                self.invalidate_token().await;
            }
        }
        result
    }

    async fn device_id(&self) -> Option<String> {
        match self.client.device().await {
            Ok(devices) => {
                let active = devices.into_iter().find(|d| d.is_active);
                if let Some(device) = &active {
                    tracing::trace!(device_name = %device.name, device_id = ?device.id, "Found active device");
                }
                active.and_then(|d| d.id)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to get devices list");
                None
            }
        }
    }
}

#[async_trait]
impl SpotifyApi for SpotifyClient {
    async fn access_token(&self) -> Result<String, ApiError> {
        self.refresh_token_if_needed().await?;
        Ok(self.token.read().await.access_token.clone())
    }

    async fn currently_playing(&self) -> Result<Option<TrackId>, ApiError> {
        self.refresh_token_if_needed().await?;
        tracing::trace!("API: currently_playing");

        let result = self
            .client
            .current_playing(None, None::<Vec<_>>)
            .await
            .map_err(ApiError::from);
        let context = self.check(result).await?;

        let track = context.and_then(|ctx| match ctx.item {
            Some(PlayableItem::Track(track)) => track.id.map(|id| TrackId::new(id.id())),
            _ => None,
        });
        Ok(track)
    }

    async fn enqueue(&self, track: &TrackId) -> Result<(), ApiError> {
        self.refresh_token_if_needed().await?;

        let id = SpotifyTrackId::from_id(track.as_str())?;
        let device_id = self.device_id().await;
        tracing::debug!(track_id = %track, device_id = ?device_id, "API: add_item_to_queue");

        let result = self
            .client
            .add_item_to_queue(PlayableId::Track(id), device_id.as_deref())
            .await
            .map_err(ApiError::from);
        self.check(result).await?;

        tracing::info!(track_id = %track, "Added track to queue");
        Ok(())
    }

    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>, ApiError> {
        self.refresh_token_if_needed().await?;
        tracing::debug!("API: current_user_playlists");

        let result = self
            .client
            .current_user_playlists()
            .try_collect::<Vec<_>>()
            .await
            .map_err(ApiError::from);
        let playlists = self.check(result).await?;

        let playlists: Vec<PlaylistSummary> = playlists
            .into_iter()
            .map(|playlist| PlaylistSummary {
                id: PlaylistId::new(playlist.id.id()),
                name: playlist.name,
                owner: playlist
                    .owner
                    .display_name
                    .unwrap_or_else(|| playlist.owner.id.id().to_string()),
                total_tracks: playlist.tracks.total,
            })
            .collect();

        tracing::debug!(count = playlists.len(), "Fetched playlists");
        Ok(playlists)
    }

    async fn playlist_tracks(&self, playlist_id: &PlaylistId) -> Result<Vec<TrackSummary>, ApiError> {
        self.refresh_token_if_needed().await?;

        let id = SpotifyPlaylistId::from_id(playlist_id.as_str())?;
        tracing::debug!(playlist_id = %playlist_id, "API: playlist_items");

        let result = self
            .client
            .playlist_items(id, None, None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(ApiError::from);
        let items = self.check(result).await?;

        let tracks: Vec<TrackSummary> = items
            .into_iter()
            .filter_map(|item| match item.track {
                Some(PlayableItem::Track(track)) => {
                    let id = track.id?;
                    Some(TrackSummary {
                        id: TrackId::new(id.id()),
                        name: track.name,
                        artists: track.artists.into_iter().map(|a| a.name).collect(),
                        album: track.album.name,
                    })
                }
                _ => None,
            })
            .collect();

        tracing::debug!(playlist_id = %playlist_id, count = tracks.len(), "Fetched playlist tracks");
        Ok(tracks)
    }

    async fn search_track(&self, name: &str, artist: &str) -> Result<Option<TrackId>, ApiError> {
        self.refresh_token_if_needed().await?;

        let query = format!("track:{name} artist:{artist}");
        tracing::debug!(query = %query, "API: search");

        let result = self
            .client
            .search(&query, SearchType::Track, None, None, Some(1), None)
            .await
            .map_err(ApiError::from);

        let hit = match self.check(result).await? {
            SearchResult::Tracks(page) => page
                .items
                .into_iter()
                .find_map(|track| track.id.map(|id| TrackId::new(id.id()))),
            _ => None,
        };

        if hit.is_none() {
            tracing::debug!(name, artist, "No matching track found");
        }
        Ok(hit)
    }
}
