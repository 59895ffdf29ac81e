use super::Provider;
use crate::db;
use crate::error::{TracklistError, TransientError};
use crate::models::Playlist;
use crate::reorder::ReorderOperation;
use crate::util::track_uri;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: i64, // epoch seconds
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Spotify provider backed by Spotify Web API.
/// Token management reads token JSON from DB and persists refreshed tokens.
/// Endpoints default to SPOTIFY_AUTH_BASE / SPOTIFY_API_BASE env vars when set
/// and can be overridden per instance with `with_base_urls` (useful for tests).
pub struct SpotifyProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    db_path: std::path::PathBuf,
    api_base: String,
    auth_base: String,
    token: tokio::sync::Mutex<Option<StoredToken>>,
    user_id: tokio::sync::Mutex<Option<String>>,
}

impl SpotifyProvider {
    pub fn new(client_id: String, client_secret: String, db_path: std::path::PathBuf) -> Self {
        // If either client_id or client_secret is empty, try to load from DB
        let (client_id, client_secret) = if client_id.is_empty() || client_secret.is_empty() {
            match rusqlite::Connection::open(&db_path)
                .ok()
                .and_then(|conn| db::load_credential_with_client(&conn, "spotify").ok().flatten())
            {
                Some((_token_json, db_client_id, db_client_secret)) => (
                    db_client_id.unwrap_or(client_id),
                    db_client_secret.unwrap_or(client_secret),
                ),
                None => (client_id, client_secret),
            }
        } else {
            (client_id, client_secret)
        };
        Self {
            client: Client::new(),
            client_id,
            client_secret,
            db_path,
            api_base: env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into()),
            auth_base: env::var("SPOTIFY_AUTH_BASE").unwrap_or_else(|_| "https://accounts.spotify.com".into()),
            token: tokio::sync::Mutex::new(None),
            user_id: tokio::sync::Mutex::new(None),
        }
    }

    pub fn with_base_urls(mut self, api_base: &str, auth_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.auth_base = auth_base.trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout; a timed out request counts as transient.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Skip the `/me` lookup when the owning user is known up front.
    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = tokio::sync::Mutex::new(user_id);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    async fn load_token_from_db(&self) -> Result<Option<StoredToken>> {
        let db_path = self.db_path.clone();
        let json_opt = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let conn = rusqlite::Connection::open(db_path)?;
            Ok(db::load_credential_with_client(&conn, "spotify")?.map(|(json, _, _)| json))
        })
        .await??;

        match json_opt {
            Some(s) => {
                let st: StoredToken = serde_json::from_str(&s).map_err(|e| anyhow!("parse token json: {}", e))?;
                Ok(Some(st))
            }
            None => Ok(None),
        }
    }

    async fn persist_token_to_db(&self, st: &StoredToken) -> Result<()> {
        let db_path = self.db_path.clone();
        let s = serde_json::to_string(&st)?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = rusqlite::Connection::open(db_path)?;
            db::update_credential_token(&conn, "spotify", &s)?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    /// Load the token if needed and refresh it when it is about to expire
    /// (or unconditionally with `force`).
    async fn ensure_token(&self, force: bool) -> Result<()> {
        let mut lock = self.token.lock().await;
        if lock.is_none() {
            *lock = self.load_token_from_db().await?;
        }
        if let Some(st) = &*lock {
            let now = Utc::now().timestamp();
            if force || now + 30 >= st.expires_at {
                debug!("Spotify token is near expiry or rejected, refreshing");
                let mut cur = st.clone();
                self.refresh_token_internal(&mut cur).await?;
                *lock = Some(cur);
            }
        }
        Ok(())
    }

    async fn refresh_token_internal(&self, cur: &mut StoredToken) -> Result<()> {
        let refresh_token = cur.refresh_token.clone().ok_or_else(|| anyhow!("no refresh token"))?;
        let params = [("grant_type", "refresh_token"), ("refresh_token", refresh_token.as_str())];
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        );
        let url = format!("{}/api/token", self.auth_base);
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header)
            .form(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to refresh token: {} - {}", status, body));
        }
        let j: Value = resp.json().await?;
        cur.access_token = j["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("no access_token"))?
            .to_string();
        cur.token_type = "Bearer".into();
        cur.expires_at = Utc::now().timestamp() + j["expires_in"].as_i64().unwrap_or(3600);
        if let Some(s) = j["scope"].as_str() {
            cur.scope = Some(s.to_string());
        }
        // Spotify may rotate the refresh token
        if let Some(r) = j["refresh_token"].as_str() {
            cur.refresh_token = Some(r.to_string());
        }
        self.persist_token_to_db(cur).await?;
        Ok(())
    }

    pub async fn get_bearer(&self) -> Result<String> {
        self.ensure_token(false).await?;
        let lock = self.token.lock().await;
        let st = lock.as_ref().ok_or_else(|| anyhow!("no spotify token stored"))?;
        Ok(format!("Bearer {}", st.access_token))
    }

    /// Send one request and decode the JSON answer (Null for empty bodies).
    ///
    /// A 401 refreshes the token and retries once. 429 and 5xx answers become
    /// [`TransientError`] so the caller's retry policy can deal with them.
    async fn send_json(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let mut refreshed = false;
        loop {
            let bearer = self.get_bearer().await?;
            let mut req = self
                .client
                .request(method.clone(), url)
                .header(AUTHORIZATION, &bearer);
            if let Some(b) = body {
                req = req.header(CONTENT_TYPE, "application/json").json(b);
            }
            let resp = req.send().await?;
            let status = resp.status();

            if status == StatusCode::UNAUTHORIZED && !refreshed {
                warn!("Got 401 from {}; attempting token refresh", url);
                self.ensure_token(true).await?;
                refreshed = true;
                continue;
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                return Err(TransientError {
                    message: format!("{} {} rate limited", method, url),
                    retry_after,
                }
                .into());
            }
            if status.is_server_error() {
                return Err(TransientError::new(format!("{} {} => {}", method, url, status)).into());
            }
            if !status.is_success() {
                let txt = resp.text().await.unwrap_or_default();
                return Err(anyhow!("{} {} failed: {} => {}", method, url, status, txt));
            }
            let txt = resp.text().await?;
            if txt.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&txt).with_context(|| format!("decoding response of {}", url));
        }
    }

    async fn get_user_id(&self) -> Result<String> {
        {
            let g = self.user_id.lock().await;
            if let Some(u) = g.as_ref() {
                return Ok(u.clone());
            }
        }
        let url = format!("{}/me", self.api_base);
        let j = self.send_json(Method::GET, &url, None).await?;
        let id = j["id"].as_str().ok_or_else(|| anyhow!("no id"))?.to_string();
        let mut g = self.user_id.lock().await;
        *g = Some(id.clone());
        Ok(id)
    }

    fn parse_playlist(j: &Value) -> Result<Playlist> {
        Ok(Playlist {
            id: j["id"].as_str().ok_or_else(|| anyhow!("playlist without id"))?.to_string(),
            name: j["name"].as_str().unwrap_or("").to_string(),
            snapshot_id: j["snapshot_id"].as_str().unwrap_or("").to_string(),
        })
    }
}

#[async_trait]
impl Provider for SpotifyProvider {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn snapshot_id(&self, playlist_id: &str) -> Result<String> {
        let url = format!("{}/playlists/{}?fields=snapshot_id", self.api_base, playlist_id);
        let j = self.send_json(Method::GET, &url, None).await?;
        j["snapshot_id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("playlist {} has no snapshot_id", playlist_id))
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>> {
        debug!("Fetching tracks of Spotify playlist {}", playlist_id);
        let mut ids = Vec::new();
        let mut next: Option<String> = Some(format!(
            "{}/playlists/{}/tracks?fields=items(track(id)),next&limit=100",
            self.api_base, playlist_id
        ));
        while let Some(url) = next {
            let j = self.send_json(Method::GET, &url, None).await?;
            if let Some(items) = j["items"].as_array() {
                // local files and removed tracks come back without an id;
                // skipping them would shift every later position
                for it in items {
                    match it["track"]["id"].as_str() {
                        Some(id) => ids.push(id.to_string()),
                        None => return Err(TracklistError::MissingTrackId { position: ids.len() }.into()),
                    }
                }
            }
            next = j["next"].as_str().map(|s| s.to_string());
        }
        Ok(ids)
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String], position: Option<usize>) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let uris: Vec<String> = track_ids.iter().map(|id| track_uri(id)).collect();
        let mut body = json!({ "uris": uris });
        if let Some(p) = position {
            body["position"] = json!(p);
        }
        self.send_json(Method::POST, &url, Some(&body)).await?;
        Ok(())
    }

    async fn remove_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let tracks: Vec<Value> = track_ids.iter().map(|id| json!({ "uri": track_uri(id) })).collect();
        let body = json!({ "tracks": tracks });
        self.send_json(Method::DELETE, &url, Some(&body)).await?;
        Ok(())
    }

    async fn reorder_tracks(&self, playlist_id: &str, reorder: &ReorderOperation) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let body = serde_json::to_value(reorder)?;
        self.send_json(Method::PUT, &url, Some(&body)).await?;
        Ok(())
    }

    async fn user_playlists(&self) -> Result<Vec<Playlist>> {
        let mut playlists = Vec::new();
        let mut next = Some(format!("{}/me/playlists?limit=50", self.api_base));
        while let Some(url) = next {
            let j = self.send_json(Method::GET, &url, None).await?;
            if let Some(items) = j["items"].as_array() {
                for pl in items {
                    playlists.push(Self::parse_playlist(pl)?);
                }
            }
            next = j["next"].as_str().map(|s| s.to_string());
        }
        Ok(playlists)
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<Playlist> {
        let user_id = self.get_user_id().await?;
        let url = format!(
            "{}/users/{}/playlists",
            self.api_base,
            url::form_urlencoded::byte_serialize(user_id.as_bytes()).collect::<String>()
        );
        let body = json!({
            "name": name,
            "description": description,
            "public": true
        });
        let j = self.send_json(Method::POST, &url, Some(&body)).await?;
        Self::parse_playlist(&j)
    }
}
