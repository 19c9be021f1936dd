use std::collections::HashSet;

use crate::common::errors::QueueError;
use crate::protocol::tracks::Track;

/// Ordered, index-addressed playback queue.
///
/// Indices are contiguous `0..n-1` and exactly mirror array position; every
/// mutation renumbers affected entries before returning, so a `QueueModel`
/// never exposes a state where `tracks[i].queue_index != i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueModel {
    tracks: Vec<Track>,
}

impl QueueModel {
    pub fn new(tracks: Vec<Track>) -> Self {
        let mut queue = Self { tracks };
        queue.renumber(0);
        queue
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }

    /// Appends to the tail and numbers the new entries.
    pub fn append(&mut self, tracks: Vec<Track>) {
        let from = self.tracks.len();
        self.tracks.extend(tracks);
        self.renumber(from);
    }

    /// Removes one entry, shifting every later index down by one.
    pub fn remove_at(&mut self, index: usize) -> Result<Track, QueueError> {
        if index >= self.tracks.len() {
            return Err(QueueError::OutOfRange {
                index,
                len: self.tracks.len(),
            });
        }
        let removed = self.tracks.remove(index);
        self.renumber(index);
        Ok(removed)
    }

    /// Moves the selected entries, as a block, to `pos`.
    ///
    /// The selection keeps its original relative order regardless of how
    /// `selected` is ordered, and `pos` is interpreted against the queue
    /// *after* removal (then clamped to it). That distinction matters
    /// whenever `pos` lands inside the span the selection vacated.
    pub fn reorder(&mut self, selected: &[usize], pos: usize) -> Result<(), QueueError> {
        let len = self.tracks.len();
        let mut seen = HashSet::with_capacity(selected.len());
        for &index in selected {
            if index >= len {
                return Err(QueueError::InvalidSelection {
                    reason: format!("index {index} out of range for queue of length {len}"),
                });
            }
            if !seen.insert(index) {
                return Err(QueueError::InvalidSelection {
                    reason: format!("duplicate index {index}"),
                });
            }
        }

        let mut moved = Vec::with_capacity(selected.len());
        let mut remaining = Vec::with_capacity(len - selected.len());
        for (index, track) in std::mem::take(&mut self.tracks).into_iter().enumerate() {
            if seen.contains(&index) {
                moved.push(track);
            } else {
                remaining.push(track);
            }
        }

        let pos = pos.min(remaining.len());
        let tail = remaining.split_off(pos);
        remaining.extend(moved);
        remaining.extend(tail);

        self.tracks = remaining;
        self.renumber(0);
        Ok(())
    }

    /// Unconditional overwrite with a canonical server snapshot. Indices
    /// are renumbered rather than trusted, so a sparse or shuffled payload
    /// still lands contiguous.
    pub fn replace(&mut self, canonical: Vec<Track>) {
        self.tracks = canonical;
        self.renumber(0);
    }

    fn renumber(&mut self, from: usize) {
        for (index, track) in self.tracks.iter_mut().enumerate().skip(from) {
            track.queue_index = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::placeholder(Some(id.to_string()), id, None)
    }

    fn queue(ids: &[&str]) -> QueueModel {
        QueueModel::new(ids.iter().map(|id| track(id)).collect())
    }

    fn ids(queue: &QueueModel) -> Vec<&str> {
        queue
            .tracks()
            .iter()
            .map(|t| t.id.as_deref().unwrap())
            .collect()
    }

    fn assert_contiguous(queue: &QueueModel) {
        for (index, track) in queue.tracks().iter().enumerate() {
            assert_eq!(track.queue_index, index, "index drift at {index}");
        }
    }

    #[test]
    fn test_append_numbers_tail() {
        let mut q = queue(&["a", "b"]);
        q.append(vec![track("c"), track("d")]);
        assert_eq!(ids(&q), ["a", "b", "c", "d"]);
        assert_contiguous(&q);
    }

    #[test]
    fn test_remove_at_renumbers_suffix() {
        let mut q = queue(&["a", "b", "c"]);
        let removed = q.remove_at(1).expect("in range");
        assert_eq!(removed.id.as_deref(), Some("b"));
        assert_eq!(ids(&q), ["a", "c"]);
        assert_contiguous(&q);

        assert_eq!(
            q.remove_at(2),
            Err(QueueError::OutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_reorder_single_to_front() {
        let mut q = queue(&["a", "b", "c", "d"]);
        q.reorder(&[2], 0).expect("valid");
        assert_eq!(ids(&q), ["c", "a", "b", "d"]);
        assert_contiguous(&q);
    }

    #[test]
    fn test_reorder_block_keeps_relative_order() {
        let mut q = queue(&["a", "b", "c", "d"]);
        // Selection order must not matter: moved stays [a, c].
        q.reorder(&[2, 0], 1).expect("valid");
        assert_eq!(ids(&q), ["b", "a", "c", "d"]);
        assert_contiguous(&q);
    }

    #[test]
    fn test_reorder_clamps_pos_to_remaining() {
        let mut q = queue(&["a", "b", "c"]);
        q.reorder(&[1], 10).expect("valid");
        assert_eq!(ids(&q), ["a", "c", "b"]);
        assert_contiguous(&q);
    }

    #[test]
    fn test_reorder_pos_inside_vacated_span() {
        // pos counts positions after removal, so moving [1, 2] to pos 2
        // lands the block after both survivors.
        let mut q = queue(&["a", "b", "c", "d"]);
        q.reorder(&[1, 2], 2).expect("valid");
        assert_eq!(ids(&q), ["a", "d", "b", "c"]);
        assert_contiguous(&q);
    }

    #[test]
    fn test_reorder_rejects_bad_selection() {
        let mut q = queue(&["a", "b"]);
        assert!(matches!(
            q.reorder(&[2], 0),
            Err(QueueError::InvalidSelection { .. })
        ));
        assert!(matches!(
            q.reorder(&[0, 0], 0),
            Err(QueueError::InvalidSelection { .. })
        ));
        // A failed reorder must leave the queue untouched.
        assert_eq!(ids(&q), ["a", "b"]);
        assert_contiguous(&q);
    }

    #[test]
    fn test_reorder_preserves_multiset() {
        let mut q = queue(&["a", "b", "c", "d", "e"]);
        q.reorder(&[4, 0, 2], 1).expect("valid");
        let mut sorted = ids(&q);
        sorted.sort();
        assert_eq!(sorted, ["a", "b", "c", "d", "e"]);
        assert_eq!(q.len(), 5);
        assert_contiguous(&q);
    }

    #[test]
    fn test_replace_renumbers_canonical_payload() {
        let mut q = queue(&["a"]);
        let mut stale = track("x");
        stale.queue_index = 7;
        q.replace(vec![stale, track("y")]);
        assert_eq!(ids(&q), ["x", "y"]);
        assert_contiguous(&q);
    }
}
