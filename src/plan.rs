use crate::error::TracklistError;
use crate::reorder::{apply_reorder, compute_add_remove, compute_reorders_with_limit, ReorderOperation, MAX_REORDER_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a playlist is brought to its target ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Tail-trimmed remove-then-add of the differing head.
    #[default]
    Diff,
    /// Drop missing, append new, then fix the order with block moves.
    Reorder,
}

/// One API call's worth of change to a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlaylistEdit {
    /// Remove every occurrence of these tracks.
    Remove { track_ids: Vec<String> },
    /// Insert tracks at `position`, or append when None.
    Add {
        track_ids: Vec<String>,
        position: Option<usize>,
    },
    Reorder(ReorderOperation),
}

/// Ordered edits; each one assumes all earlier ones were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub edits: Vec<PlaylistEdit>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn removed_count(&self) -> usize {
        self.edits
            .iter()
            .map(|e| match e {
                PlaylistEdit::Remove { track_ids } => track_ids.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn added_count(&self) -> usize {
        self.edits
            .iter()
            .map(|e| match e {
                PlaylistEdit::Add { track_ids, .. } => track_ids.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn reorder_count(&self) -> usize {
        self.edits
            .iter()
            .filter(|e| matches!(e, PlaylistEdit::Reorder(_)))
            .count()
    }
}

/// Plan the edits turning `current` into `target`, split into batches of at
/// most `max_batch_size` (clamped to 1..=100) tracks.
pub fn plan_playlist_update(
    target: &[String],
    current: &[String],
    mode: SyncMode,
    max_batch_size: usize,
) -> Result<SyncPlan, TracklistError> {
    let batch = max_batch_size.clamp(1, MAX_REORDER_LENGTH);
    let mut edits = Vec::new();

    match mode {
        SyncMode::Diff => {
            let diff = compute_add_remove(target, current);
            for chunk in diff.to_remove.chunks(batch) {
                edits.push(PlaylistEdit::Remove {
                    track_ids: chunk.to_vec(),
                });
            }
            for (i, chunk) in diff.to_add.chunks(batch).enumerate() {
                edits.push(PlaylistEdit::Add {
                    track_ids: chunk.to_vec(),
                    position: Some(i * batch),
                });
            }
        }
        SyncMode::Reorder => {
            let target_set: HashSet<&String> = target.iter().collect();
            let current_set: HashSet<&String> = current.iter().collect();

            let to_remove: Vec<String> = current
                .iter()
                .filter(|id| !target_set.contains(id))
                .cloned()
                .collect();
            let to_add: Vec<String> = target
                .iter()
                .filter(|id| !current_set.contains(id))
                .cloned()
                .collect();

            let mut after_add_remove: Vec<String> = current
                .iter()
                .filter(|id| target_set.contains(id))
                .cloned()
                .collect();
            after_add_remove.extend(to_add.iter().cloned());

            for chunk in to_remove.chunks(batch) {
                edits.push(PlaylistEdit::Remove {
                    track_ids: chunk.to_vec(),
                });
            }
            for chunk in to_add.chunks(batch) {
                edits.push(PlaylistEdit::Add {
                    track_ids: chunk.to_vec(),
                    position: None,
                });
            }
            let reorders = compute_reorders_with_limit(target, &after_add_remove, batch)?;
            edits.extend(reorders.into_iter().map(PlaylistEdit::Reorder));
        }
    }

    Ok(SyncPlan { edits })
}

/// Apply one edit to a local copy of a playlist, the way the remote applies it.
pub fn apply_edit(tracks: &mut Vec<String>, edit: &PlaylistEdit) -> Result<(), TracklistError> {
    match edit {
        PlaylistEdit::Remove { track_ids } => {
            let doomed: HashSet<&String> = track_ids.iter().collect();
            tracks.retain(|t| !doomed.contains(t));
        }
        PlaylistEdit::Add { track_ids, position } => {
            let at = position.unwrap_or(tracks.len());
            if at > tracks.len() {
                return Err(TracklistError::OutOfRange {
                    start: at,
                    length: track_ids.len(),
                    len: tracks.len(),
                });
            }
            tracks.splice(at..at, track_ids.iter().cloned());
        }
        PlaylistEdit::Reorder(reorder) => apply_reorder(tracks, reorder)?,
    }
    Ok(())
}
