pub mod mock;
pub mod spotify;

use crate::models::Playlist;
use crate::reorder::ReorderOperation;
use anyhow::Result;

/// Provider trait: the playlist operations the sync layer needs.
/// Implementations: spotify::SpotifyProvider, mock::MockProvider.
///
/// Track arguments are bare track IDs; providers translate to whatever
/// reference their API wants. Batching is done by the caller.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Return the provider's name (for logging)
    fn name(&self) -> &str;

    /// Current revision token of a playlist.
    async fn snapshot_id(&self, playlist_id: &str) -> Result<String>;

    /// Track IDs of a playlist, in playlist order.
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<String>>;

    /// Insert tracks at `position`, or append when None.
    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String], position: Option<usize>) -> Result<()>;

    /// Remove all occurrences of the given tracks.
    async fn remove_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    /// Move a contiguous block of tracks.
    async fn reorder_tracks(&self, playlist_id: &str, reorder: &ReorderOperation) -> Result<()>;

    /// All playlists owned or followed by the authenticated user.
    async fn user_playlists(&self) -> Result<Vec<Playlist>>;

    /// Create a playlist and return it.
    async fn create_playlist(&self, name: &str, description: &str) -> Result<Playlist>;
}
