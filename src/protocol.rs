//! Event-bus protocol shared by all runtime components.
//!
//! This module defines the message payloads exchanged between command
//! producers (console, sleep timer), the output engine, and the playback
//! coordinator, plus the session events the coordinator publishes.

use std::time::Duration;

use crate::{
    output::LoadHandle,
    playback::session::SessionSnapshot,
    track::TrackId,
};

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Playback(PlaybackMessage),
    Output(OutputEvent),
    Session(SessionEvent),
}

/// Collection a playlist snapshot is copied from when playback starts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum PlaybackSource {
    /// Every track in the library, newest first.
    Library,
    /// A user playlist, ordered by title.
    Playlist { id: String },
    /// Most played tracks (plays > 0), highest first.
    MostPlayed { limit: usize },
}

/// Commands handled by the playback coordinator.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    Play {
        track_id: TrackId,
        source: PlaybackSource,
    },
    Next,
    Previous,
    Pause,
    Resume,
    TogglePlayPause,
    SeekForward,
    SeekBackward,
    SeekTo(Duration),
    /// A seek gesture started; position updates are held back.
    BeginScrub,
    /// The seek gesture ended at the given position.
    CommitScrub(Duration),
    CancelScrub,
    Enqueue(TrackId),
    RemoveFromQueue(TrackId),
    MoveQueueEntry {
        from: usize,
        to: usize,
    },
    ClearQueue,
    DeleteTrack(TrackId),
    RenameTrack {
        id: TrackId,
        title: String,
    },
    SetSleepTimer(Duration),
    StopSleepTimer,
    SleepTimerFired {
        generation: u64,
    },
    RequestSnapshot,
    Shutdown,
}

/// Notifications posted by the output engine from its own context.
#[derive(Debug, Clone)]
pub enum OutputEvent {
    /// The engine's active item changed. `item` is `None` when the item
    /// behind `handle` ended and nothing followed it.
    ItemChanged {
        handle: LoadHandle,
        item: Option<TrackId>,
    },
    ItemFailed {
        handle: LoadHandle,
        track_id: TrackId,
        reason: String,
    },
    PositionTick {
        handle: LoadHandle,
        seconds: f64,
    },
    /// Raw duration report; may be NaN or infinite while loading.
    DurationChanged {
        handle: LoadHandle,
        seconds: f64,
    },
    SeekCompleted {
        generation: u64,
        succeeded: bool,
    },
}

/// Session changes published by the coordinator, in FIFO order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    PositionChanged(Duration),
    ItemChanged(Option<TrackId>),
    DurationChanged(Duration),
    SnapshotChanged(SessionSnapshot),
    SleepTimerChanged(bool),
    PlayCountChanged { track_id: TrackId, play_count: u32 },
    /// Playback ran out; now-playing surfaces should close.
    NowPlayingDeactivated,
    /// A user-visible failure.
    Error(String),
}
