use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing;

use crate::config::{Auth, Storage};

pub const SCOPES: &str =
    "playlist-read-private playlist-read-collaborative playlist-modify-public playlist-modify-private user-modify-playback-state user-read-playback-state user-read-currently-playing";

const RESPONSE: &str = r#"
<!doctype html>
<html>
<head><title>Success</title></head>
<body><h1>Authentication Successful!</h1><script>window.close();</script></body>
</html>
"#;

#[derive(Clone)]
pub struct AuthResult {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

fn expires_at_from(instant: Instant) -> DateTime<Utc> {
    let remaining = instant.saturating_duration_since(Instant::now());
    Utc::now() + chrono::Duration::from_std(remaining).unwrap_or(chrono::Duration::zero())
}

fn store_refresh_token(storage: &Storage, refresh_token: &str) {
    let path = storage.refresh_token_path();
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    match fs::write(&path, refresh_token) {
        Ok(()) => tracing::debug!("Saved refresh token to disk"),
        Err(e) => tracing::warn!(error = %e, path = %path.display(), "Could not save refresh token"),
    }
}

fn oauth_client(auth: &Auth, browser: bool) -> Result<librespot_oauth::OAuthClient> {
    let mut builder = librespot_oauth::OAuthClientBuilder::new(
        &auth.client_id,
        &auth.redirect_uri,
        SCOPES.split_whitespace().collect(),
    );
    if browser {
        builder = builder.open_in_browser().with_custom_message(RESPONSE);
    }
    builder.build().context("Failed to build OAuth client")
}

async fn perform_browser_auth(auth: &Auth, storage: &Storage) -> Result<AuthResult> {
    tracing::info!("Starting browser-based OAuth flow");
    let client = oauth_client(auth, true)?;

    let token = client
        .get_access_token_async()
        .await
        .context("Failed to get token")?;

    store_refresh_token(storage, &token.refresh_token);

    tracing::info!("Browser authentication completed successfully");
    Ok(AuthResult {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: expires_at_from(token.expires_at),
    })
}

/// Exchanges a refresh token for a new access token and persists the
/// rotated refresh token.
pub async fn refresh_access_token(
    auth: &Auth,
    storage: &Storage,
    refresh_token: &str,
) -> Result<AuthResult> {
    let client = oauth_client(auth, false)?;
    let token = client
        .refresh_token_async(refresh_token)
        .await
        .context("Failed to refresh access token")?;

    store_refresh_token(storage, &token.refresh_token);
    tracing::debug!("Token refreshed successfully");

    Ok(AuthResult {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: expires_at_from(token.expires_at),
    })
}

/// Uses the cached refresh token when there is one, otherwise (or when it is
/// rejected) runs the browser flow.
pub async fn perform_oauth_flow(auth: &Auth, storage: &Storage) -> Result<AuthResult> {
    let stored_refresh_token = read_refresh_token(&storage.refresh_token_path());

    match stored_refresh_token {
        Some(refresh_token) => {
            tracing::info!("Found cached refresh token");
            match refresh_access_token(auth, storage, &refresh_token).await {
                Ok(result) => Ok(result),
                Err(e) => {
                    tracing::warn!(error = %e, "Cached refresh token failed, re-authenticating");
                    perform_browser_auth(auth, storage).await
                }
            }
        }
        None => {
            tracing::info!("No cached credentials found, starting browser authentication");
            perform_browser_auth(auth, storage).await
        }
    }
}

fn read_refresh_token(path: &Path) -> Option<String> {
    let token = fs::read_to_string(path).ok()?;
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
