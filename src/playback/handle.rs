use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use log::warn;
use tokio::sync::broadcast::{Receiver, Sender};

use super::session::SessionSnapshot;
use crate::{
    protocol::{Message, PlaybackMessage, PlaybackSource},
    track::TrackId,
};

/// Cloneable command surface for a running coordinator.
///
/// Commands are posted on the bus and applied in order on the coordinator
/// thread; session changes come back through [`PlaybackHandle::subscribe`].
#[derive(Clone)]
pub struct PlaybackHandle {
    bus_sender: Sender<Message>,
    snapshot: Arc<Mutex<SessionSnapshot>>,
}

impl PlaybackHandle {
    pub fn new(bus_sender: Sender<Message>, snapshot: Arc<Mutex<SessionSnapshot>>) -> Self {
        Self {
            bus_sender,
            snapshot,
        }
    }

    fn send(&self, message: PlaybackMessage) {
        if self.bus_sender.send(Message::Playback(message)).is_err() {
            warn!("PlaybackHandle: no coordinator is listening");
        }
    }

    pub fn play(&self, track_id: TrackId, source: PlaybackSource) {
        self.send(PlaybackMessage::Play { track_id, source });
    }

    pub fn next(&self) {
        self.send(PlaybackMessage::Next);
    }

    pub fn previous(&self) {
        self.send(PlaybackMessage::Previous);
    }

    pub fn pause(&self) {
        self.send(PlaybackMessage::Pause);
    }

    pub fn resume(&self) {
        self.send(PlaybackMessage::Resume);
    }

    pub fn toggle_play_pause(&self) {
        self.send(PlaybackMessage::TogglePlayPause);
    }

    pub fn seek_forward(&self) {
        self.send(PlaybackMessage::SeekForward);
    }

    pub fn seek_backward(&self) {
        self.send(PlaybackMessage::SeekBackward);
    }

    pub fn seek_to(&self, position: Duration) {
        self.send(PlaybackMessage::SeekTo(position));
    }

    pub fn begin_scrub(&self) {
        self.send(PlaybackMessage::BeginScrub);
    }

    pub fn commit_scrub(&self, position: Duration) {
        self.send(PlaybackMessage::CommitScrub(position));
    }

    pub fn cancel_scrub(&self) {
        self.send(PlaybackMessage::CancelScrub);
    }

    pub fn enqueue(&self, track_id: TrackId) {
        self.send(PlaybackMessage::Enqueue(track_id));
    }

    pub fn remove_from_queue(&self, track_id: TrackId) {
        self.send(PlaybackMessage::RemoveFromQueue(track_id));
    }

    pub fn move_queue_entry(&self, from: usize, to: usize) {
        self.send(PlaybackMessage::MoveQueueEntry { from, to });
    }

    pub fn clear_queue(&self) {
        self.send(PlaybackMessage::ClearQueue);
    }

    pub fn delete_track(&self, track_id: TrackId) {
        self.send(PlaybackMessage::DeleteTrack(track_id));
    }

    pub fn rename_track(&self, track_id: TrackId, title: &str) {
        self.send(PlaybackMessage::RenameTrack {
            id: track_id,
            title: title.to_string(),
        });
    }

    pub fn set_sleep_timer(&self, duration: Duration) {
        self.send(PlaybackMessage::SetSleepTimer(duration));
    }

    pub fn stop_sleep_timer(&self) {
        self.send(PlaybackMessage::StopSleepTimer);
    }

    pub fn request_snapshot(&self) {
        self.send(PlaybackMessage::RequestSnapshot);
    }

    pub fn shutdown(&self) {
        self.send(PlaybackMessage::Shutdown);
    }

    pub fn subscribe(&self) -> Receiver<Message> {
        self.bus_sender.subscribe()
    }

    /// The last snapshot the coordinator published.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot
            .lock()
            .expect("snapshot lock poisoned")
            .clone()
    }
}
