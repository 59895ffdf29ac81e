use super::Provider;
use crate::error::TransientError;
use crate::models::Playlist;
use crate::plan::{apply_edit, PlaylistEdit};
use crate::reorder::ReorderOperation;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone)]
struct MockPlaylist {
    name: String,
    tracks: Vec<String>,
    revision: u64,
}

impl MockPlaylist {
    fn snapshot_id(&self) -> String {
        format!("mock-snapshot-{}", self.revision)
    }
}

#[derive(Debug, Default)]
struct MockState {
    playlists: BTreeMap<String, MockPlaylist>,
    calls: Vec<String>,
    pending_failures: u32,
    next_playlist: u64,
}

/// An in-memory provider used in tests and dry runs.
/// Playlists behave like the remote ones: every mutation bumps the snapshot id.
#[derive(Debug, Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a playlist with the given tracks.
    pub fn with_playlist(self, playlist_id: &str, tracks: Vec<String>) -> Self {
        if let Ok(mut st) = self.state.lock() {
            st.playlists.insert(
                playlist_id.to_string(),
                MockPlaylist {
                    name: playlist_id.to_string(),
                    tracks,
                    revision: 0,
                },
            );
        }
        self
    }

    /// Make the next `n` calls fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        if let Ok(mut st) = self.state.lock() {
            st.pending_failures = n;
        }
    }

    pub fn tracks(&self, playlist_id: &str) -> Option<Vec<String>> {
        let st = self.state.lock().ok()?;
        st.playlists.get(playlist_id).map(|p| p.tracks.clone())
    }

    /// Names of the calls that reached the playlist (failed attempts included).
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().map(|st| st.calls.clone()).unwrap_or_default()
    }

    fn enter(&self, call: &str) -> Result<std::sync::MutexGuard<'_, MockState>> {
        let mut st = self.state.lock().map_err(|_| anyhow!("mock provider state poisoned"))?;
        st.calls.push(call.to_string());
        if st.pending_failures > 0 {
            st.pending_failures -= 1;
            return Err(TransientError::new(format!("mock {} unavailable", call)).into());
        }
        Ok(st)
    }

    fn edit(&self, call: &str, playlist_id: &str, edit: &PlaylistEdit) -> Result<()> {
        let mut st = self.enter(call)?;
        let playlist = st
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| anyhow!("mock playlist {} not found", playlist_id))?;
        apply_edit(&mut playlist.tracks, edit)?;
        playlist.revision += 1;
        Ok(())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn snapshot_id(&self, playlist_id: &str) -> Result<String> {
        let st = self.enter("snapshot_id")?;
        st.playlists
            .get(playlist_id)
            .map(|p| p.snapshot_id())
            .ok_or_else(|| anyhow!("mock playlist {} not found", playlist_id))
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>> {
        let st = self.enter("playlist_tracks")?;
        st.playlists
            .get(playlist_id)
            .map(|p| p.tracks.clone())
            .ok_or_else(|| anyhow!("mock playlist {} not found", playlist_id))
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String], position: Option<usize>) -> Result<()> {
        info!("MockProvider: add_tracks {} -> {} tracks", playlist_id, track_ids.len());
        self.edit(
            "add_tracks",
            playlist_id,
            &PlaylistEdit::Add {
                track_ids: track_ids.to_vec(),
                position,
            },
        )
    }

    async fn remove_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        info!("MockProvider: remove_tracks {} -> {} tracks", playlist_id, track_ids.len());
        self.edit(
            "remove_tracks",
            playlist_id,
            &PlaylistEdit::Remove {
                track_ids: track_ids.to_vec(),
            },
        )
    }

    async fn reorder_tracks(&self, playlist_id: &str, reorder: &ReorderOperation) -> Result<()> {
        info!("MockProvider: reorder_tracks {} -> {:?}", playlist_id, reorder);
        self.edit("reorder_tracks", playlist_id, &PlaylistEdit::Reorder(*reorder))
    }

    async fn user_playlists(&self) -> Result<Vec<Playlist>> {
        let st = self.enter("user_playlists")?;
        Ok(st
            .playlists
            .iter()
            .map(|(id, p)| Playlist {
                id: id.clone(),
                name: p.name.clone(),
                snapshot_id: p.snapshot_id(),
            })
            .collect())
    }

    async fn create_playlist(&self, name: &str, _description: &str) -> Result<Playlist> {
        let mut st = self.enter("create_playlist")?;
        st.next_playlist += 1;
        let id = format!("mock-playlist-{}", st.next_playlist);
        let playlist = MockPlaylist {
            name: name.to_string(),
            tracks: Vec::new(),
            revision: 0,
        };
        let snapshot_id = playlist.snapshot_id();
        st.playlists.insert(id.clone(), playlist);
        Ok(Playlist {
            id,
            name: name.to_string(),
            snapshot_id,
        })
    }
}
