//! Model module - data types, persistence and the Spotify API boundary
//!
//! - `types`: Track/playlist ids, groups, and the summaries shown to a UI host
//! - `group_store`: Persisted playlist → groups mapping
//! - `api`: The `SpotifyApi` seam and its error taxonomy
//! - `spotify_client`: `SpotifyApi` over the Web API, with token refresh

mod types;
mod group_store;
mod api;
mod spotify_client;

pub use types::{Group, PlaylistId, PlaylistSummary, TrackId, TrackSummary};

pub use group_store::{GroupMap, GroupStore, JsonGroupStore};

pub use api::{ApiError, SpotifyApi};

pub use spotify_client::SpotifyClient;
