use crate::error::TracklistError;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// An ordered sequence of unique values with O(1) reverse lookup.
///
/// `positions[v]` always equals the offset of `v` in `values`. The map is
/// updated incrementally by `delete`/`insert`, touching only the suffix that
/// actually shifted, so a planner driving many block moves stays
/// sub-quadratic.
#[derive(Debug, Clone)]
pub struct IndexedSequence<T> {
    values: Vec<T>,
    positions: HashMap<T, usize>,
}

impl<T> IndexedSequence<T>
where
    T: Eq + Hash + Clone + Debug,
{
    /// Build from an initial ordering. Fails on the first repeated value.
    pub fn new<I>(initial: I) -> Result<Self, TracklistError>
    where
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = initial.into_iter().collect();
        let mut positions = HashMap::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            if positions.insert(value.clone(), index).is_some() {
                return Err(TracklistError::DuplicateValue(format!("{:?}", value)));
            }
        }
        Ok(Self { values, positions })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    /// Contiguous block `[start, start + length)`, or None when out of bounds.
    pub fn get_range(&self, start: usize, length: usize) -> Option<&[T]> {
        let end = start.checked_add(length)?;
        self.values.get(start..end)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn contains(&self, value: &T) -> bool {
        self.positions.contains_key(value)
    }

    /// Current offset of `value`.
    pub fn index_of(&self, value: &T) -> Result<usize, TracklistError> {
        self.positions
            .get(value)
            .copied()
            .ok_or_else(|| TracklistError::NotFound(format!("{:?}", value)))
    }

    /// Remove `[start, start + length)` and return the removed block.
    pub fn delete(&mut self, start: usize, length: usize) -> Result<Vec<T>, TracklistError> {
        let end = self.checked_end(start, length)?;
        let removed: Vec<T> = self.values.drain(start..end).collect();
        for value in &removed {
            self.positions.remove(value);
        }
        for value in &self.values[start..] {
            if let Some(position) = self.positions.get_mut(value) {
                *position -= length;
            }
        }
        Ok(removed)
    }

    /// Splice `items` in so that the first of them lands at `start`.
    ///
    /// Uniqueness is checked before anything is touched; on error the
    /// sequence is unchanged.
    pub fn insert(&mut self, start: usize, items: Vec<T>) -> Result<(), TracklistError> {
        if start > self.values.len() {
            return Err(TracklistError::OutOfRange {
                start,
                length: items.len(),
                len: self.values.len(),
            });
        }
        let mut incoming = HashSet::with_capacity(items.len());
        for item in &items {
            if self.positions.contains_key(item) || !incoming.insert(item) {
                return Err(TracklistError::DuplicateValue(format!("{:?}", item)));
            }
        }

        let count = items.len();
        for (offset, item) in items.iter().enumerate() {
            self.positions.insert(item.clone(), start + offset);
        }
        self.values.splice(start..start, items);
        for value in &self.values[start + count..] {
            if let Some(position) = self.positions.get_mut(value) {
                *position += count;
            }
        }
        Ok(())
    }

    /// Move `[start, start + length)` so that it begins at `insert_before`,
    /// where `insert_before` is read with the block already taken out.
    pub fn move_block(
        &mut self,
        start: usize,
        length: usize,
        insert_before: usize,
    ) -> Result<(), TracklistError> {
        let block = self.delete(start, length)?;
        self.insert(insert_before, block)
    }

    fn checked_end(&self, start: usize, length: usize) -> Result<usize, TracklistError> {
        match start.checked_add(length) {
            Some(end) if end <= self.values.len() => Ok(end),
            _ => Err(TracklistError::OutOfRange {
                start,
                length,
                len: self.values.len(),
            }),
        }
    }
}

impl<'a, T> IntoIterator for &'a IndexedSequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
