use crate::api::Provider;
use crate::config::Config;
use crate::db;
use crate::models::Label;
use crate::plan::{plan_playlist_update, PlaylistEdit, SyncMode};
use crate::retry::{retry_transient, RetryPolicy};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Knobs for one playlist update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub mode: SyncMode,
    pub max_batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: SyncMode::Diff,
            max_batch_size: 100,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            mode: cfg.sync_mode,
            max_batch_size: cfg.max_batch_size,
            retry: cfg.retry_policy(),
        }
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub removed: usize,
    pub added: usize,
    pub reorders: usize,
    /// Write calls issued, not counting retries.
    pub api_calls: usize,
}

/// Bring a remote playlist to `target`.
///
/// `current` is the last known tracklist (a stored snapshot); when None the
/// live tracklist is fetched. Edits are issued one at a time, in plan order,
/// each with its own retry budget. A failing edit aborts the update.
pub async fn set_playlist_tracks(
    provider: &dyn Provider,
    playlist_id: &str,
    target: &[String],
    current: Option<Vec<String>>,
    options: &SyncOptions,
) -> Result<SyncReport> {
    info!("Updating tracklist of {} playlist {}", provider.name(), playlist_id);
    let current = match current {
        Some(c) => {
            info!("Current snapshot already in database");
            c
        }
        None => retry_transient(&options.retry, "fetching playlist tracks", || provider.playlist_tracks(playlist_id))
            .await
            .with_context(|| format!("fetching tracks of playlist {}", playlist_id))?,
    };

    let plan = plan_playlist_update(target, &current, options.mode, options.max_batch_size)
        .with_context(|| format!("planning update of playlist {}", playlist_id))?;
    let report = SyncReport {
        removed: plan.removed_count(),
        added: plan.added_count(),
        reorders: plan.reorder_count(),
        api_calls: plan.edits.len(),
    };
    info!(
        "Removing {} tracks, adding {} tracks, {} reorders",
        report.removed, report.added, report.reorders
    );

    for (i, edit) in plan.edits.iter().enumerate() {
        let what = match edit {
            PlaylistEdit::Remove { .. } => "removing tracks",
            PlaylistEdit::Add { .. } => "adding tracks",
            PlaylistEdit::Reorder(_) => "reordering tracks",
        };
        retry_transient(&options.retry, what, || async move {
            match edit {
                PlaylistEdit::Remove { track_ids } => provider.remove_tracks(playlist_id, track_ids).await,
                PlaylistEdit::Add { track_ids, position } => {
                    provider.add_tracks(playlist_id, track_ids, *position).await
                }
                PlaylistEdit::Reorder(reorder) => provider.reorder_tracks(playlist_id, reorder).await,
            }
        })
        .await
        .with_context(|| format!("edit {}/{} on playlist {}", i + 1, plan.edits.len(), playlist_id))?;
    }

    Ok(report)
}

/// Sync a label's playlist to `target` and record the result as a snapshot.
///
/// The stored snapshot matching the playlist's current revision stands in for
/// a tracklist fetch. Returns the new snapshot id.
pub async fn update_label_playlist(
    db_path: &Path,
    provider: &dyn Provider,
    label: &Label,
    target: &[String],
    options: &SyncOptions,
) -> Result<String> {
    info!("Updating playlist of label {}", label.name);
    let playlist_id = label.playlist_id.as_str();
    let snapshot_id = retry_transient(&options.retry, "fetching snapshot id", || provider.snapshot_id(playlist_id)).await?;

    let stored = blocking_db(db_path, move |conn| db::get_snapshot(conn, &snapshot_id)).await?;
    let current = if stored.is_empty() { None } else { Some(stored) };

    let report = set_playlist_tracks(provider, playlist_id, target, current, options).await?;
    info!("Playlist {} updated: {:?}", playlist_id, report);

    let new_snapshot_id = retry_transient(&options.retry, "fetching snapshot id", || provider.snapshot_id(playlist_id)).await?;
    let target = target.to_vec();
    let pid = playlist_id.to_string();
    let sid = new_snapshot_id.clone();
    let written = blocking_db(db_path, move |conn| db::upload_snapshot(conn, &pid, &sid, &target)).await?;
    if !written {
        info!("Snapshot {} already in database, skipping", new_snapshot_id);
    }
    Ok(new_snapshot_id)
}

/// Store the live tracklist of a playlist unless its revision is already
/// known. Returns the snapshot id.
pub async fn record_playlist_snapshot(
    db_path: &Path,
    provider: &dyn Provider,
    playlist_id: &str,
    retry: &RetryPolicy,
) -> Result<String> {
    let snapshot_id = retry_transient(retry, "fetching snapshot id", || provider.snapshot_id(playlist_id)).await?;
    let sid = snapshot_id.clone();
    if blocking_db(db_path, move |conn| db::snapshot_is_in_db(conn, &sid)).await? {
        info!("Snapshot {} already in database, skipping", snapshot_id);
        return Ok(snapshot_id);
    }
    let tracks = retry_transient(retry, "fetching playlist tracks", || provider.playlist_tracks(playlist_id)).await?;
    let pid = playlist_id.to_string();
    let sid = snapshot_id.clone();
    blocking_db(db_path, move |conn| db::upload_snapshot(conn, &pid, &sid, &tracks)).await?;
    Ok(snapshot_id)
}

/// Run a database closure on the blocking pool with a fresh connection.
async fn blocking_db<T, F>(db_path: &Path, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
{
    let db_path: PathBuf = db_path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<T> {
        let path_display = db_path.display().to_string();
        let mut conn = rusqlite::Connection::open(&db_path)
            .with_context(|| format!("opening DB at {}", path_display))?;
        f(&mut conn)
    })
    .await?
}
