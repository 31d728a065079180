mod auth;
mod config;
mod controller;
mod logging;
mod model;
mod notify;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use config::{Config, ObserveMode};
use controller::{GroupController, Request, Response, RunSettings};
use model::{JsonGroupStore, PlaylistId, SpotifyClient, TrackId};
use notify::{ChannelNotifier, LogNotifier, Notifier};

#[derive(Parser, Debug)]
#[command(version, about = "Keeps grouped Spotify tracks playing back-to-back, even on shuffle")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = Config::FILENAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch playback and queue the rest of a group when its first track starts.
    /// Also serves JSON requests, one per line, on stdin.
    Run {
        /// Wait for CURRENT_TRACK requests instead of polling Spotify
        #[arg(long)]
        push: bool,
    },
    /// List your playlists
    Playlists,
    /// List the tracks of a playlist
    Tracks { playlist_id: String },
    /// List the groups saved for a playlist
    Groups { playlist_id: String },
    /// Save a group: these tracks will always play in this order
    AddGroup {
        playlist_id: String,
        /// Track ids or spotify:track: URIs, in play order
        #[arg(required = true, num_args = 2..)]
        track_ids: Vec<String>,
    },
    /// List every grouped track id
    Grouped,
    /// Look up a track id by name and artist
    Resolve { name: String, artist: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== spotify-group-queue starting ===");

    let result = execute(args.command, &config).await;
    if let Err(e) = &result {
        tracing::error!(error = ?e, "Command failed");
    }
    tracing::info!("spotify-group-queue shutting down");
    result
}

/// Commands that never touch Spotify skip authentication.
fn needs_spotify(command: &Command) -> bool {
    !matches!(
        command,
        Command::Groups { .. } | Command::AddGroup { .. } | Command::Grouped
    )
}

async fn execute(command: Command, config: &Config) -> Result<()> {
    let store = Arc::new(JsonGroupStore::new(config.storage.groups_path()));
    tracing::debug!(path = %store.path().display(), "Using group store");

    let api: Arc<dyn model::SpotifyApi> = if needs_spotify(&command) {
        config.validate()?;
        let auth_result = auth::perform_oauth_flow(&config.auth, &config.storage).await?;
        let client =
            SpotifyClient::connect(auth_result, config.auth.clone(), config.storage.clone()).await?;
        Arc::new(client)
    } else {
        Arc::new(OfflineApi)
    };

    let request = match command {
        Command::Run { push } => {
            let mode = if push { ObserveMode::Push } else { config.general.mode };
            return run(api, store, config, mode).await;
        }
        Command::Playlists => Request::FetchPlaylists,
        Command::Tracks { playlist_id } => Request::FetchTracks {
            playlist_id: PlaylistId::new(playlist_id),
        },
        Command::Groups { playlist_id } => Request::GetGroups {
            playlist_id: PlaylistId::new(playlist_id),
        },
        Command::AddGroup {
            playlist_id,
            track_ids,
        } => Request::SaveGroup {
            playlist_id: PlaylistId::new(playlist_id),
            track_ids: track_ids.iter().map(|id| TrackId::parse(id)).collect(),
        },
        Command::Grouped => Request::GetGroupedSongs,
        Command::Resolve { name, artist } => Request::ResolveTrack {
            track_name: name,
            artist_name: artist,
        },
    };

    let controller = GroupController::new(api, store, Arc::new(LogNotifier), config.notify.clone());
    print_response(controller.dispatch(request).await)
}

async fn run(
    api: Arc<dyn model::SpotifyApi>,
    store: Arc<JsonGroupStore>,
    config: &Config,
    mode: ObserveMode,
) -> Result<()> {
    let (notifier, notifications) = ChannelNotifier::channel();
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);
    let controller = GroupController::new(api, store, notifier, config.notify.clone());

    let settings = RunSettings {
        mode,
        poll_interval: config.general.poll_interval(),
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    controller
        .run(
            settings,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            notifications,
            shutdown,
        )
        .await
}

fn print_response(response: Response) -> Result<()> {
    match response {
        Response::Playlists { playlists } => {
            for playlist in playlists {
                println!("{}\t{}\t{} tracks\t{}", playlist.id, playlist.name, playlist.total_tracks, playlist.owner);
            }
        }
        Response::Tracks { tracks } => {
            for track in tracks {
                println!("{}\t{} by {}", track.id, track.name, track.artists.join(", "));
            }
        }
        Response::Groups { groups } => {
            if groups.is_empty() {
                println!("No groups created for this playlist.");
            }
            for (index, group) in groups.iter().enumerate() {
                let tracks: Vec<&str> = group.tracks().iter().map(TrackId::as_str).collect();
                println!("Group {}: {} songs\t{}", index + 1, group.len(), tracks.join(" "));
            }
        }
        Response::GroupedSongs { grouped_songs } => {
            for track in grouped_songs {
                println!("{track}");
            }
        }
        Response::GroupSaved { .. } => println!("Group saved successfully!"),
        Response::TrackResolved { track_id: Some(id) } => println!("{id}"),
        Response::TrackResolved { track_id: None } => println!("No matching track found."),
        Response::Error { error } => bail!(error),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

/// Stand-in for commands that only touch the local group store.
struct OfflineApi;

#[async_trait::async_trait]
impl model::SpotifyApi for OfflineApi {
    async fn access_token(&self) -> Result<String, model::ApiError> {
        Err(offline())
    }

    async fn currently_playing(&self) -> Result<Option<TrackId>, model::ApiError> {
        Err(offline())
    }

    async fn enqueue(&self, _track: &TrackId) -> Result<(), model::ApiError> {
        Err(offline())
    }

    async fn user_playlists(&self) -> Result<Vec<model::PlaylistSummary>, model::ApiError> {
        Err(offline())
    }

    async fn playlist_tracks(
        &self,
        _playlist_id: &PlaylistId,
    ) -> Result<Vec<model::TrackSummary>, model::ApiError> {
        Err(offline())
    }

    async fn search_track(&self, _name: &str, _artist: &str) -> Result<Option<TrackId>, model::ApiError> {
        Err(offline())
    }
}

fn offline() -> model::ApiError {
    model::ApiError::Unauthorized("not signed in to Spotify for this command".to_string())
}
