use crate::error::TracklistError;
use crate::indexed::IndexedSequence;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

/// Largest block a single reorder call may move.
pub const MAX_REORDER_LENGTH: usize = 100;

/// Move `range_length` items starting at `range_start` so they sit just before
/// `insert_before`.
///
/// Field names and meaning match the body of the remote "reorder items" call,
/// so a value can be serialized and sent as-is. Offsets are only valid against
/// the playlist state left by every operation emitted before this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderOperation {
    pub range_start: usize,
    pub range_length: usize,
    pub insert_before: usize,
}

/// Items to drop from and to put into a playlist, both in playlist order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddRemovePlan<T> {
    pub to_add: Vec<T>,
    pub to_remove: Vec<T>,
}

/// Position of the first pair that differs, if any. Stops at the end of the
/// shorter input.
pub fn first_differing_index<A, B, T>(left: A, right: B) -> Option<usize>
where
    A: IntoIterator<Item = T>,
    B: IntoIterator<Item = T>,
    T: PartialEq,
{
    left.into_iter()
        .zip(right)
        .position(|(l, r)| l != r)
}

/// Cheap add/remove diff: trims the tail shared by both orderings and treats
/// whatever is left in front as replaced wholesale.
///
/// The caller removes `to_remove` first, then inserts `to_add` at the head.
/// This is not a minimal diff; an interior change makes everything before it
/// part of the plan. It is linear and fits playlists that change at the
/// new-releases end.
pub fn compute_add_remove<T>(target: &[T], current: &[T]) -> AddRemovePlan<T>
where
    T: Clone + PartialEq,
{
    let (to_add, to_remove) =
        match first_differing_index(target.iter().rev(), current.iter().rev()) {
            Some(0) => (target.to_vec(), current.to_vec()),
            Some(shared) => (
                target[..target.len() - shared].to_vec(),
                current[..current.len() - shared].to_vec(),
            ),
            // one is a suffix of the other: only the longer one's head differs
            None if current.len() > target.len() => {
                (Vec::new(), current[..current.len() - target.len()].to_vec())
            }
            None => (target[..target.len() - current.len()].to_vec(), Vec::new()),
        };
    AddRemovePlan { to_add, to_remove }
}

/// Reorders turning `current` into `target`, moving at most
/// [`MAX_REORDER_LENGTH`] items per operation.
pub fn compute_reorders<T>(target: &[T], current: &[T]) -> Result<Vec<ReorderOperation>, TracklistError>
where
    T: Eq + Hash + Clone + Debug,
{
    compute_reorders_with_limit(target, current, MAX_REORDER_LENGTH)
}

/// Greedy left-to-right reorder planning.
///
/// Keeps a cursor below which the evolving sequence already matches `target`.
/// Each step pulls the item `target` wants at the cursor, together with the
/// longest run after it that continues `target` in order, and moves that
/// block to the cursor. The matched prefix grows by at least one per step.
pub fn compute_reorders_with_limit<T>(
    target: &[T],
    current: &[T],
    max_reorder_length: usize,
) -> Result<Vec<ReorderOperation>, TracklistError>
where
    T: Eq + Hash + Clone + Debug,
{
    ensure_same_items(target, current)?;
    let max_reorder_length = max_reorder_length.max(1);
    let mut sequence = IndexedSequence::new(current.iter().cloned())?;
    let len = sequence.len();
    let mut reorders = Vec::new();
    let mut insert_before = 0;

    loop {
        while insert_before < len && sequence.get(insert_before) == target.get(insert_before) {
            insert_before += 1;
        }
        if insert_before >= len {
            break;
        }

        let start = sequence.index_of(&target[insert_before])?;
        let mut length = 1;
        while length <= max_reorder_length
            && start + length - 1 < len
            && insert_before + length - 1 < len
            && sequence.get(start + length - 1) == target.get(insert_before + length - 1)
        {
            length += 1;
        }
        // the last increment only probed one past the run
        if length > 1 {
            length -= 1;
        }

        let reorder = ReorderOperation {
            range_start: start,
            range_length: length,
            insert_before,
        };
        sequence.move_block(reorder.range_start, reorder.range_length, reorder.insert_before)?;
        reorders.push(reorder);
        insert_before += length;
    }

    Ok(reorders)
}

/// Reference semantics of one block move on a plain vector: take the block
/// out, then insert it at `insert_before` in what remains.
///
/// Planned reorders always have `insert_before < range_start`, so this agrees
/// with the remote API reading `insert_before` before the block is taken out.
pub fn apply_reorder<T>(items: &mut Vec<T>, reorder: &ReorderOperation) -> Result<(), TracklistError> {
    let end = reorder.range_start + reorder.range_length;
    if end > items.len() {
        return Err(TracklistError::OutOfRange {
            start: reorder.range_start,
            length: reorder.range_length,
            len: items.len(),
        });
    }
    if reorder.insert_before > items.len() - reorder.range_length {
        return Err(TracklistError::OutOfRange {
            start: reorder.insert_before,
            length: reorder.range_length,
            len: items.len() - reorder.range_length,
        });
    }
    let block: Vec<T> = items.drain(reorder.range_start..end).collect();
    items.splice(reorder.insert_before..reorder.insert_before, block);
    Ok(())
}

fn ensure_same_items<T>(target: &[T], current: &[T]) -> Result<(), TracklistError>
where
    T: Eq + Hash + Debug,
{
    let mut target_set = HashSet::with_capacity(target.len());
    for item in target {
        if !target_set.insert(item) {
            return Err(TracklistError::DuplicateValue(format!("{:?}", item)));
        }
    }
    let current_set: HashSet<&T> = current.iter().collect();
    let only_in_target = target_set.difference(&current_set).count();
    let only_in_current = current_set.difference(&target_set).count();
    if only_in_target > 0 || only_in_current > 0 {
        return Err(TracklistError::SetMismatch {
            only_in_target,
            only_in_current,
        });
    }
    Ok(())
}
