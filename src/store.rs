//! Interfaces to the persistence collaborators the coordinator consumes.

use crate::{
    error::StoreError,
    protocol::PlaybackSource,
    track::{Track, TrackId},
};

/// Supplies ordered track collections and applies library edits.
pub trait TrackStore {
    /// Point-in-time copy of the tracks behind `source`, in playback order.
    fn tracks_for(&self, source: &PlaybackSource) -> Result<Vec<Track>, StoreError>;

    fn track(&self, id: TrackId) -> Result<Track, StoreError>;

    fn delete(&self, id: TrackId) -> Result<(), StoreError>;

    fn rename(&self, id: TrackId, title: &str) -> Result<(), StoreError>;
}

/// Records plays. Durability is the sink's concern.
pub trait PlayCountSink {
    /// Adds one play and returns the new total.
    fn increment(&self, id: TrackId) -> Result<u32, StoreError>;
}
