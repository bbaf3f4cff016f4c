//! Error types shared by the playback subsystem.
//!
//! None of these are fatal: every failure path degrades the session to
//! `Idle` instead of aborting the process.

use std::time::Duration;

use thiserror::Error;

use crate::track::TrackId;

/// Playback coordination failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// A playback source resolved to zero tracks.
    #[error("Playlist is empty")]
    EmptyPlaylist,

    /// The cursor ran past the last track.
    #[error("End of playlist reached")]
    EndOfPlaylist,

    /// The output engine could not load a track.
    #[error("Could not load track {track_id}: {reason}")]
    TrackLoadFailure { track_id: TrackId, reason: String },

    /// Consecutive load failures exceeded the retry bound.
    #[error("Stopped after {attempts} tracks in a row failed to load")]
    TooManyLoadFailures { attempts: usize },

    /// The output engine rejected a seek.
    #[error("Seek to {target:?} failed")]
    SeekFailure { target: Duration },

    /// A mutation raced an in-flight operation it invalidated.
    #[error("Conflicting mutation: {0}")]
    ConcurrentMutationConflict(String),

    /// The requested track is not part of the playback source.
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// The track store failed.
    #[error("Track store error: {0}")]
    Store(String),
}

impl PlaybackError {
    /// Expected outcomes that resolve to `Idle` without surfacing to the user.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            PlaybackError::EmptyPlaylist | PlaybackError::EndOfPlaylist
        )
    }
}

/// Track store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid track row: {0}")]
    InvalidRow(String),

    #[error("Invalid track: {0}")]
    InvalidTrack(#[from] crate::track::TrackError),

    #[error("Track not found: {0}")]
    NotFound(TrackId),

    #[error("Could not create data directory: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for PlaybackError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => PlaybackError::TrackNotFound(id),
            other => PlaybackError::Store(other.to_string()),
        }
    }
}
