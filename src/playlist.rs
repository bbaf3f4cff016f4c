//! The active playlist snapshot and the cursor that walks it.

use crate::{
    error::PlaybackError,
    track::{Track, TrackId},
};

/// Result of removing a track from the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Removal {
    /// Number of occurrences removed.
    pub removed: usize,
    /// The occurrence under the cursor was one of them.
    pub current_removed: bool,
}

/// Ordered playlist snapshot plus the current playback position.
///
/// After the track under the cursor is removed the cursor sits in a gap in
/// front of its successor: `current()` is `None`, the next `advance()` lands
/// on the successor without skipping it, and `retreat()` lands on the
/// predecessor.
#[derive(Debug, Clone, Default)]
pub struct PlaylistCursor {
    tracks: Vec<Track>,
    position: Option<usize>,
    in_gap: bool,
}

impl PlaylistCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot and positions the cursor at `start_index`
    /// (clamped to the last track).
    pub fn set_playlist(
        &mut self,
        tracks: Vec<Track>,
        start_index: usize,
    ) -> Result<(), PlaybackError> {
        if tracks.is_empty() {
            return Err(PlaybackError::EmptyPlaylist);
        }
        let position = start_index.min(tracks.len() - 1);
        self.tracks = tracks;
        self.position = Some(position);
        self.in_gap = false;
        Ok(())
    }

    /// Moves to the next track and returns its index.
    ///
    /// On `EndOfPlaylist` the position is left on the last track.
    pub fn advance(&mut self) -> Result<usize, PlaybackError> {
        let Some(position) = self.position else {
            return Err(PlaybackError::EmptyPlaylist);
        };

        if self.in_gap {
            self.in_gap = false;
            if position < self.tracks.len() {
                return Ok(position);
            }
            self.position = Some(self.tracks.len() - 1);
            return Err(PlaybackError::EndOfPlaylist);
        }

        let next = position + 1;
        if next < self.tracks.len() {
            self.position = Some(next);
            Ok(next)
        } else {
            Err(PlaybackError::EndOfPlaylist)
        }
    }

    /// Moves one track back, floored at zero. Never fails on a non-empty
    /// playlist.
    pub fn retreat(&mut self) -> Option<usize> {
        let position = self.position?;
        let previous = position.saturating_sub(1);
        self.position = Some(previous);
        self.in_gap = false;
        Some(previous)
    }

    /// Removes every occurrence of `track_id` and keeps the cursor on the
    /// same track identity.
    pub fn remove(&mut self, track_id: TrackId) -> Removal {
        let mut outcome = Removal::default();
        let doomed: Vec<usize> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.id() == track_id)
            .map(|(index, _)| index)
            .collect();

        for index in doomed.into_iter().rev() {
            self.tracks.remove(index);
            outcome.removed += 1;

            let Some(position) = self.position else {
                continue;
            };
            if index < position {
                self.position = Some(position - 1);
            } else if index == position && !self.in_gap {
                self.in_gap = true;
                outcome.current_removed = true;
            }
        }

        if self.tracks.is_empty() {
            self.position = None;
            self.in_gap = false;
        }
        outcome
    }

    /// The track under the cursor, unless it was removed.
    pub fn current(&self) -> Option<&Track> {
        if self.in_gap {
            return None;
        }
        self.position.and_then(|position| self.tracks.get(position))
    }

    /// The track `advance()` would land on.
    pub fn peek_next(&self) -> Option<&Track> {
        let position = self.position?;
        if self.in_gap {
            self.tracks.get(position)
        } else {
            self.tracks.get(position + 1)
        }
    }

    pub fn get_playing_track_index(&self) -> Option<usize> {
        if self.in_gap {
            return None;
        }
        self.position
    }

    pub fn get_track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Applies `update` to every occurrence of `track_id`.
    pub fn update_track<F>(&mut self, track_id: TrackId, mut update: F) -> usize
    where
        F: FnMut(&mut Track),
    {
        let mut touched = 0;
        for track in self.tracks.iter_mut().filter(|track| track.id() == track_id) {
            update(track);
            touched += 1;
        }
        touched
    }
}
