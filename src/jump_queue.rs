//! "Play next" queue: tracks that preempt the playlist order.

use std::collections::VecDeque;

use crate::track::{Track, TrackId};

/// FIFO of out-of-band tracks. A track id is queued at most once.
#[derive(Debug, Clone, Default)]
pub struct JumpQueue {
    entries: VecDeque<Track>,
}

impl JumpQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `track`. Returns `false` when the id is already queued.
    pub fn enqueue(&mut self, track: Track) -> bool {
        if self.contains(track.id()) {
            return false;
        }
        self.entries.push_back(track);
        true
    }

    pub fn dequeue_front(&mut self) -> Option<Track> {
        self.entries.pop_front()
    }

    pub fn front(&self) -> Option<&Track> {
        self.entries.front()
    }

    /// Removes the entry for `track_id`, if queued.
    pub fn remove(&mut self, track_id: TrackId) -> Option<Track> {
        let index = self
            .entries
            .iter()
            .position(|track| track.id() == track_id)?;
        self.entries.remove(index)
    }

    /// Moves the entry at `from` so that it ends up at index `to`.
    /// `to` past the end moves the entry to the back.
    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        let Some(entry) = self.entries.remove(from) else {
            return false;
        };
        let to = to.min(self.entries.len());
        self.entries.insert(to, entry);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.entries.iter().any(|track| track.id() == track_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.entries.iter()
    }

    pub fn update_track<F>(&mut self, track_id: TrackId, update: F) -> bool
    where
        F: FnOnce(&mut Track),
    {
        match self.entries.iter_mut().find(|track| track.id() == track_id) {
            Some(track) => {
                update(track);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(titles: &[&str]) -> (JumpQueue, Vec<Track>) {
        let tracks: Vec<Track> = titles
            .iter()
            .map(|title| Track::new(title).expect("valid title"))
            .collect();
        let mut queue = JumpQueue::new();
        for track in &tracks {
            assert!(queue.enqueue(track.clone()));
        }
        (queue, tracks)
    }

    fn titles(queue: &JumpQueue) -> Vec<String> {
        queue.iter().map(|track| track.title().to_string()).collect()
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let (mut queue, tracks) = queue_of(&["x", "y"]);
        assert_eq!(queue.dequeue_front().map(|t| t.id()), Some(tracks[0].id()));
        assert_eq!(queue.dequeue_front().map(|t| t.id()), Some(tracks[1].id()));
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn test_duplicate_ids_are_ignored() {
        let (mut queue, tracks) = queue_of(&["x"]);
        assert!(!queue.enqueue(tracks[0].clone()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_by_id() {
        let (mut queue, tracks) = queue_of(&["x", "y", "z"]);
        assert!(queue.remove(tracks[1].id()).is_some());
        assert!(queue.remove(tracks[1].id()).is_none());
        assert_eq!(titles(&queue), vec!["x", "z"]);
    }

    #[test]
    fn test_move_entry_reorders() {
        let (mut queue, _) = queue_of(&["x", "y", "z"]);
        assert!(queue.move_entry(0, 2));
        assert_eq!(titles(&queue), vec!["y", "z", "x"]);
        assert!(queue.move_entry(2, 0));
        assert_eq!(titles(&queue), vec!["x", "y", "z"]);
        assert!(queue.move_entry(1, 99));
        assert_eq!(titles(&queue), vec!["x", "z", "y"]);
        assert!(!queue.move_entry(5, 0));
    }
}
