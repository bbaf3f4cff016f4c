//! Contract for the external continuous-playback primitive.
//!
//! The coordinator drives an [`OutputBridge`] synchronously from its own
//! thread. The engine answers asynchronously by posting
//! [`OutputEvent`](crate::protocol::OutputEvent)s on the bus, each tagged with
//! the [`LoadHandle`] of the item it concerns.

pub mod headless;

use std::{fmt, time::Duration};

use thiserror::Error;

use crate::track::{Track, TrackId};

/// Identifies one load of one item inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadHandle(pub u64);

impl fmt::Display for LoadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error("Media for '{0}' is unavailable")]
    Unavailable(String),

    #[error("Output engine is not ready: {0}")]
    NotReady(String),
}

pub trait OutputBridge: Send {
    /// Replaces the current item and drops any pending follow-up item.
    fn load(&mut self, track: &Track) -> Result<LoadHandle, OutputError>;

    /// Sets the single follow-up item, replacing a previous one.
    fn enqueue_next(&mut self, track: &Track) -> Result<LoadHandle, OutputError>;

    fn clear_next(&mut self);

    /// Ends the current item now and moves to the follow-up item, if any.
    fn advance_to_next(&mut self);

    fn play(&mut self);

    fn pause(&mut self);

    /// Starts a seek. Completion is reported with `SeekCompleted { generation }`.
    fn seek(&mut self, position: Duration, generation: u64);

    fn current_position(&self) -> Duration;

    /// `None` while the duration is unknown.
    fn current_item_duration(&self) -> Option<Duration>;

    fn current_item_identity(&self) -> Option<TrackId>;

    /// Handle of the item the engine is on right now. May be ahead of the
    /// notifications already posted on the bus.
    fn current_item_handle(&self) -> Option<LoadHandle>;

    /// Unloads everything.
    fn stop(&mut self);
}
