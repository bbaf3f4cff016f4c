//! Published session state.

use std::{fmt, time::Duration};

use crate::track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// A track was handed to the output engine and awaits confirmation.
    Loading,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Playback is requested: the engine is either producing or about to.
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::Loading | PlaybackState::Playing)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// Point-in-time copy of the playback session.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub current_track: Option<Track>,
    /// Index of the current track in the active playlist. `None` while the
    /// playlist is empty or its current entry was removed.
    pub position: Option<usize>,
    pub playlist_len: usize,
    pub is_playing: bool,
    pub current_time: Duration,
    pub duration: Option<Duration>,
    pub is_sleep_timer_active: bool,
    /// Time left on the sleep timer when the snapshot was taken.
    pub sleep_timer_remaining: Option<Duration>,
    pub jump_queue: Vec<Track>,
}

impl SessionSnapshot {
    pub fn current_track_id(&self) -> Option<crate::track::TrackId> {
        self.current_track.as_ref().map(Track::id)
    }
}
