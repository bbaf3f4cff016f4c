//! Owner of the playback session.
//!
//! Every mutation of the playlist cursor, jump queue, and now-playing state
//! happens inside [`PlaybackCoordinator::handle_message`], which runs on the
//! coordinator's own thread. Output-engine notifications reach it only as
//! bus messages, so a user `next()` and an engine "item ended" can never
//! interleave.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{debug, error, info, trace, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use super::session::{PlaybackState, SessionSnapshot};
use crate::{
    config::PlaybackConfig,
    error::{PlaybackError, StoreError},
    jump_queue::JumpQueue,
    observer::{DurationObserver, ItemChangeObserver, ItemEvent, TimeObserver},
    output::{LoadHandle, OutputBridge},
    playlist::PlaylistCursor,
    protocol::{Message, OutputEvent, PlaybackMessage, PlaybackSource, SessionEvent},
    sleep_timer::SleepTimer,
    store::{PlayCountSink, TrackStore},
    track::{Track, TrackId},
};

/// Where the now-playing track came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// The entry under the playlist cursor.
    Playlist,
    /// An entry taken from the jump queue; the cursor did not move.
    Jump,
}

#[derive(Debug, Clone)]
struct NowPlaying {
    track: Track,
    handle: LoadHandle,
    origin: Origin,
}

/// The upcoming track mirrored into the engine for a gapless hand-over.
#[derive(Debug, Clone)]
struct FollowUp {
    track: Track,
    handle: LoadHandle,
    origin: Origin,
}

#[derive(Debug, Clone, Copy)]
struct OutstandingSeek {
    generation: u64,
    target: Duration,
    /// Completing this seek ends a scrub gesture.
    resumes_time_observer: bool,
}

pub struct PlaybackCoordinator<S> {
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,
    output: Box<dyn OutputBridge>,
    store: S,
    settings: PlaybackConfig,

    cursor: PlaylistCursor,
    jump_queue: JumpQueue,
    state: PlaybackState,
    now_playing: Option<NowPlaying>,
    follow_up: Option<FollowUp>,
    /// Follow-ups replaced or cleared since the last load, oldest first. The
    /// engine may have promoted one of them before the replacement reached it.
    superseded_follow_ups: Vec<FollowUp>,
    prefetch_enabled: bool,

    time_observer: TimeObserver,
    item_observer: ItemChangeObserver,
    duration_observer: DurationObserver,
    sleep_timer: SleepTimer,

    seek_generation: u64,
    outstanding_seek: Option<OutstandingSeek>,
    current_time: Duration,
    duration: Option<Duration>,
    consecutive_load_failures: usize,

    snapshot: Arc<Mutex<SessionSnapshot>>,
}

impl<S> PlaybackCoordinator<S>
where
    S: TrackStore + PlayCountSink,
{
    pub fn new(
        bus_receiver: Receiver<Message>,
        bus_sender: Sender<Message>,
        output: Box<dyn OutputBridge>,
        store: S,
        settings: PlaybackConfig,
    ) -> Self {
        let time_observer = TimeObserver::new(settings.position_interval());
        let item_observer = ItemChangeObserver::new(settings.max_consecutive_empty_transitions);
        let sleep_timer = SleepTimer::new(bus_sender.clone());
        Self {
            bus_receiver,
            bus_sender,
            output,
            store,
            settings,
            cursor: PlaylistCursor::new(),
            jump_queue: JumpQueue::new(),
            state: PlaybackState::Idle,
            now_playing: None,
            follow_up: None,
            superseded_follow_ups: Vec::new(),
            prefetch_enabled: true,
            time_observer,
            item_observer,
            duration_observer: DurationObserver::new(),
            sleep_timer,
            seek_generation: 0,
            outstanding_seek: None,
            current_time: Duration::ZERO,
            duration: None,
            consecutive_load_failures: 0,
            snapshot: Arc::new(Mutex::new(SessionSnapshot::default())),
        }
    }

    /// Shared cell holding the last published snapshot.
    pub fn snapshot_cell(&self) -> Arc<Mutex<SessionSnapshot>> {
        self.snapshot.clone()
    }

    pub fn run(&mut self) {
        info!("PlaybackCoordinator: started");
        loop {
            match self.bus_receiver.blocking_recv() {
                Ok(message) => {
                    if !self.handle_message(message) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "PlaybackCoordinator lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(RecvError::Closed) => {
                    error!("PlaybackCoordinator: bus closed");
                    break;
                }
            }
        }
        info!("PlaybackCoordinator: stopped");
    }

    /// Applies one bus message. Returns `false` once the coordinator should
    /// stop.
    pub fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::Playback(message) => return self.handle_playback_message(message),
            Message::Output(event) => self.handle_output_event(event),
            Message::Session(_) => {}
        }
        true
    }

    fn handle_playback_message(&mut self, message: PlaybackMessage) -> bool {
        match message {
            PlaybackMessage::Play { track_id, source } => self.play(track_id, source),
            PlaybackMessage::Next => self.next(),
            PlaybackMessage::Previous => self.previous(),
            PlaybackMessage::Pause => self.pause(),
            PlaybackMessage::Resume => self.resume(),
            PlaybackMessage::TogglePlayPause => {
                if self.state == PlaybackState::Paused {
                    self.resume();
                } else {
                    self.pause();
                }
            }
            PlaybackMessage::SeekForward => self.seek_by_step(true),
            PlaybackMessage::SeekBackward => self.seek_by_step(false),
            PlaybackMessage::SeekTo(target) => self.seek_to(target, false),
            PlaybackMessage::BeginScrub => {
                debug!("PlaybackCoordinator: scrub started");
                self.time_observer.suspend();
            }
            PlaybackMessage::CommitScrub(target) => {
                debug!("PlaybackCoordinator: scrub committed at {:?}", target);
                if self.state == PlaybackState::Idle {
                    self.time_observer.resume();
                } else {
                    self.seek_to(target, true);
                }
            }
            PlaybackMessage::CancelScrub => {
                debug!("PlaybackCoordinator: scrub cancelled");
                self.time_observer.resume();
            }
            PlaybackMessage::Enqueue(track_id) => self.enqueue(track_id),
            PlaybackMessage::RemoveFromQueue(track_id) => {
                if self.jump_queue.remove(track_id).is_some() {
                    debug!("PlaybackCoordinator: removed {} from jump queue", track_id);
                    self.sync_follow_up();
                    self.publish_snapshot();
                }
            }
            PlaybackMessage::MoveQueueEntry { from, to } => {
                if self.jump_queue.move_entry(from, to) {
                    self.sync_follow_up();
                    self.publish_snapshot();
                } else {
                    debug!("PlaybackCoordinator: no jump queue entry at {}", from);
                }
            }
            PlaybackMessage::ClearQueue => {
                if !self.jump_queue.is_empty() {
                    self.jump_queue.clear();
                    self.sync_follow_up();
                    self.publish_snapshot();
                }
            }
            PlaybackMessage::DeleteTrack(track_id) => self.delete_track(track_id),
            PlaybackMessage::RenameTrack { id, title } => self.rename_track(id, &title),
            PlaybackMessage::SetSleepTimer(duration) => {
                let generation = self.sleep_timer.start(duration);
                info!(
                    "PlaybackCoordinator: sleep timer set for {:?} (generation {})",
                    duration, generation
                );
                self.publish(SessionEvent::SleepTimerChanged(true));
                self.publish_snapshot();
            }
            PlaybackMessage::StopSleepTimer => {
                if self.sleep_timer.stop() {
                    info!("PlaybackCoordinator: sleep timer cancelled");
                    self.publish(SessionEvent::SleepTimerChanged(false));
                    self.publish_snapshot();
                }
            }
            PlaybackMessage::SleepTimerFired { generation } => {
                if self.sleep_timer.fire(generation) {
                    info!("PlaybackCoordinator: sleep timer elapsed, pausing");
                    self.pause();
                    self.publish(SessionEvent::SleepTimerChanged(false));
                    self.publish_snapshot();
                } else {
                    trace!(
                        "PlaybackCoordinator: ignoring stale sleep timer generation {}",
                        generation
                    );
                }
            }
            PlaybackMessage::RequestSnapshot => self.publish_snapshot(),
            PlaybackMessage::Shutdown => {
                info!("PlaybackCoordinator: shutting down");
                self.sleep_timer.stop();
                self.output.stop();
                return false;
            }
        }
        true
    }

    fn handle_output_event(&mut self, event: OutputEvent) {
        match event {
            OutputEvent::ItemChanged {
                handle,
                item: Some(track_id),
            } => {
                if self
                    .follow_up
                    .as_ref()
                    .is_some_and(|follow_up| follow_up.handle == handle)
                {
                    debug!("PlaybackCoordinator: engine moved on to follow-up {}", handle);
                    self.commit_follow_up();
                } else if self.adopt_superseded(handle) {
                    debug!(
                        "PlaybackCoordinator: engine moved on to replaced follow-up {}",
                        handle
                    );
                }
                if self.is_current_handle(handle) {
                    self.on_item_confirmed(track_id);
                } else {
                    trace!("PlaybackCoordinator: ignoring stale item change {}", handle);
                }
            }
            OutputEvent::ItemChanged { handle, item: None } => {
                if !self.is_current_handle(handle) || self.state == PlaybackState::Idle {
                    trace!("PlaybackCoordinator: ignoring stale empty transition {}", handle);
                    return;
                }
                self.on_engine_emptied();
            }
            OutputEvent::ItemFailed {
                handle,
                track_id,
                reason,
            } => {
                if self.is_current_handle(handle) {
                    self.now_playing = None;
                    let failure = PlaybackError::TrackLoadFailure { track_id, reason };
                    if let Some((track, origin)) = self.register_load_failure(failure) {
                        self.play_candidate(track, origin);
                    }
                } else if self
                    .follow_up
                    .as_ref()
                    .is_some_and(|follow_up| follow_up.handle == handle)
                {
                    warn!(
                        "PlaybackCoordinator: follow-up {} failed ({}); prefetch disabled",
                        track_id, reason
                    );
                    self.disable_prefetch();
                } else {
                    trace!("PlaybackCoordinator: ignoring stale failure {}", handle);
                }
            }
            OutputEvent::PositionTick { handle, seconds } => {
                if !self.is_current_handle(handle) || self.outstanding_seek.is_some() {
                    return;
                }
                let playing = self.state == PlaybackState::Playing;
                if let Some(position) = self.time_observer.observe(seconds, playing) {
                    self.current_time = position;
                    self.publish(SessionEvent::PositionChanged(position));
                    self.refresh_snapshot();
                }
            }
            OutputEvent::DurationChanged { handle, seconds } => {
                if !self.is_current_handle(handle) {
                    return;
                }
                if let Some(duration) = self.duration_observer.observe(seconds) {
                    self.duration = Some(duration);
                    self.publish(SessionEvent::DurationChanged(duration));
                    self.refresh_snapshot();
                }
            }
            OutputEvent::SeekCompleted {
                generation,
                succeeded,
            } => self.on_seek_completed(generation, succeeded),
        }
    }

    fn play(&mut self, track_id: TrackId, source: PlaybackSource) {
        if self.state != PlaybackState::Idle
            && self.output.current_item_identity() == Some(track_id)
        {
            debug!(
                "PlaybackCoordinator: {} is already the active item, not restarting",
                track_id
            );
            if self.state == PlaybackState::Paused {
                self.resume();
            }
            return;
        }

        let tracks = match self.store.tracks_for(&source) {
            Ok(tracks) => tracks,
            Err(err) => {
                error!("PlaybackCoordinator: failed to read {:?}: {}", source, err);
                self.publish_error(err.into());
                return;
            }
        };
        let Some(start_index) = tracks.iter().position(|track| track.id() == track_id) else {
            warn!(
                "PlaybackCoordinator: {} is not part of {:?}",
                track_id, source
            );
            self.publish_error(PlaybackError::TrackNotFound(track_id));
            return;
        };
        if let Err(err) = self.cursor.set_playlist(tracks, start_index) {
            debug!("PlaybackCoordinator: {}", err);
            self.finish_session();
            return;
        }

        debug!(
            "PlaybackCoordinator: playing {} from {:?} at index {}",
            track_id, source, start_index
        );
        self.consecutive_load_failures = 0;
        self.prefetch_enabled = true;
        match self.cursor.current().cloned() {
            Some(track) => self.play_candidate(track, Origin::Playlist),
            None => self.finish_session(),
        }
    }

    fn next(&mut self) {
        if self.state == PlaybackState::Idle {
            debug!("PlaybackCoordinator: ignoring next while idle");
            return;
        }
        if self.adopt_engine_item() {
            // The skip applies to the item the engine is on, not the one
            // it already left.
            self.sync_follow_up();
        }
        if self.follow_up.is_some() {
            debug!("PlaybackCoordinator: advancing to follow-up");
            self.output.advance_to_next();
            self.commit_follow_up();
            self.output.play();
            self.state = PlaybackState::Loading;
            self.sync_follow_up();
            self.publish_snapshot();
        } else {
            self.advance_without_follow_up();
        }
    }

    fn previous(&mut self) {
        let Some(origin) = self.now_playing.as_ref().map(|now_playing| now_playing.origin) else {
            debug!("PlaybackCoordinator: ignoring previous while idle");
            return;
        };

        let elapsed = self.output.current_position();
        if elapsed >= self.settings.restart_threshold() {
            debug!("PlaybackCoordinator: restarting current track");
            self.seek_to(Duration::ZERO, false);
            return;
        }

        let target = match origin {
            // A jump track is not a playlist member: step back onto the
            // playlist entry it interrupted.
            Origin::Jump => match self.cursor.current() {
                Some(track) => Some(track.clone()),
                None => self.retreat_cursor(),
            },
            Origin::Playlist => {
                if self.cursor.get_playing_track_index() == Some(0) {
                    debug!("PlaybackCoordinator: at first track, restarting in place");
                    self.seek_to(Duration::ZERO, false);
                    return;
                }
                self.retreat_cursor()
            }
        };

        match target {
            Some(track) => {
                self.consecutive_load_failures = 0;
                self.play_candidate(track, Origin::Playlist);
            }
            None => self.seek_to(Duration::ZERO, false),
        }
    }

    fn retreat_cursor(&mut self) -> Option<Track> {
        let index = self.cursor.retreat()?;
        self.cursor.get_track(index).cloned()
    }

    fn pause(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        debug!("PlaybackCoordinator: pause");
        self.output.pause();
        self.state = PlaybackState::Paused;
        self.publish_snapshot();
    }

    fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        debug!("PlaybackCoordinator: resume");
        self.output.play();
        self.state = PlaybackState::Playing;
        self.publish_snapshot();
    }

    fn seek_by_step(&mut self, forward: bool) {
        if self.state == PlaybackState::Idle {
            return;
        }
        let step = self.settings.seek_step();
        let current = self.output.current_position();
        let target = if forward {
            let Some(duration) = self.known_duration() else {
                debug!("PlaybackCoordinator: duration unknown, skipping seek forward");
                return;
            };
            current.saturating_add(step).min(duration)
        } else {
            current.saturating_sub(step)
        };
        self.seek_to(target, false);
    }

    fn seek_to(&mut self, target: Duration, ends_scrub: bool) {
        if self.state == PlaybackState::Idle {
            return;
        }
        let target = match self.known_duration() {
            Some(duration) => target.min(duration),
            None => target,
        };

        let mut resumes_time_observer = ends_scrub;
        if let Some(superseded) = self.outstanding_seek.take() {
            trace!(
                "PlaybackCoordinator: seek {} superseded",
                superseded.generation
            );
            resumes_time_observer |= superseded.resumes_time_observer;
        }

        self.seek_generation += 1;
        let generation = self.seek_generation;
        self.outstanding_seek = Some(OutstandingSeek {
            generation,
            target,
            resumes_time_observer,
        });
        debug!(
            "PlaybackCoordinator: seeking to {:?} (generation {})",
            target, generation
        );
        self.output.seek(target, generation);
    }

    fn known_duration(&self) -> Option<Duration> {
        self.duration.or_else(|| self.output.current_item_duration())
    }

    fn on_seek_completed(&mut self, generation: u64, succeeded: bool) {
        let seek = match self.outstanding_seek {
            Some(seek) if seek.generation == generation => seek,
            _ => {
                trace!(
                    "PlaybackCoordinator: ignoring stale seek completion {}",
                    generation
                );
                return;
            }
        };
        self.outstanding_seek = None;

        if succeeded {
            self.current_time = seek.target;
        } else {
            warn!(
                "PlaybackCoordinator: {}; keeping {:?}",
                PlaybackError::SeekFailure {
                    target: seek.target
                },
                self.current_time
            );
        }
        if seek.resumes_time_observer {
            self.time_observer.resume();
        }
        self.publish(SessionEvent::PositionChanged(self.current_time));
        self.publish_snapshot();
    }

    /// Drops the outstanding seek so its completion is ignored.
    fn invalidate_seek(&mut self) {
        self.seek_generation += 1;
        if let Some(seek) = self.outstanding_seek.take() {
            debug!("PlaybackCoordinator: dropping seek {}", seek.generation);
            if seek.resumes_time_observer {
                self.time_observer.resume();
            }
        }
    }

    fn enqueue(&mut self, track_id: TrackId) {
        let track = match self.store.track(track_id) {
            Ok(track) => track,
            Err(err) => {
                warn!("PlaybackCoordinator: cannot enqueue {}: {}", track_id, err);
                self.publish_error(err.into());
                return;
            }
        };
        if self.jump_queue.enqueue(track) {
            debug!("PlaybackCoordinator: queued {} to play next", track_id);
            self.sync_follow_up();
            self.publish_snapshot();
        } else {
            debug!("PlaybackCoordinator: {} is already queued", track_id);
        }
    }

    fn delete_track(&mut self, track_id: TrackId) {
        let current_deleted = self
            .now_playing
            .as_ref()
            .is_some_and(|now_playing| now_playing.track.id() == track_id);

        if current_deleted && self.outstanding_seek.is_some() {
            let conflict = PlaybackError::ConcurrentMutationConflict(format!(
                "seek outstanding while deleting {}",
                track_id
            ));
            debug!("PlaybackCoordinator: {}", conflict);
        }
        if current_deleted {
            self.invalidate_seek();
        }

        let dequeued = self.jump_queue.remove(track_id).is_some();
        let removal = self.cursor.remove(track_id);
        debug!(
            "PlaybackCoordinator: deleting {} (queued={}, playlist occurrences={}, current={})",
            track_id, dequeued, removal.removed, current_deleted
        );

        match self.store.delete(track_id) {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                debug!("PlaybackCoordinator: {} was not in the store", track_id)
            }
            Err(err) => {
                error!("PlaybackCoordinator: failed to delete {}: {}", track_id, err);
                self.publish_error(err.into());
            }
        }

        if current_deleted {
            // The follow-up may itself be the deleted track.
            self.sync_follow_up();
            self.next();
        } else {
            self.sync_follow_up();
            self.publish_snapshot();
        }
    }

    fn rename_track(&mut self, track_id: TrackId, title: &str) {
        if let Err(err) = self.store.rename(track_id, title) {
            warn!("PlaybackCoordinator: failed to rename {}: {}", track_id, err);
            self.publish_error(err.into());
            return;
        }
        let retitle = |track: &mut Track| {
            if let Err(err) = track.set_title(title) {
                warn!("PlaybackCoordinator: {}", err);
            }
        };
        self.cursor.update_track(track_id, retitle);
        self.jump_queue.update_track(track_id, retitle);
        if let Some(now_playing) = self.now_playing.as_mut() {
            if now_playing.track.id() == track_id {
                retitle(&mut now_playing.track);
            }
        }
        if let Some(follow_up) = self.follow_up.as_mut() {
            if follow_up.track.id() == track_id {
                retitle(&mut follow_up.track);
            }
        }
        self.publish_snapshot();
    }

    /// Loads `track` and keeps skipping forward while loads fail, up to the
    /// configured bound.
    fn play_candidate(&mut self, track: Track, origin: Origin) {
        let mut candidate = Some((track, origin));
        while let Some((track, origin)) = candidate.take() {
            if let Err(failure) = self.try_load(track, origin) {
                candidate = self.register_load_failure(failure);
            }
        }
    }

    fn try_load(&mut self, track: Track, origin: Origin) -> Result<(), PlaybackError> {
        self.reset_item_state();
        self.discard_follow_up();
        self.now_playing = None;
        self.item_observer.arm();

        let loaded = self.output.load(&track);
        self.superseded_follow_ups.clear();
        match loaded {
            Ok(handle) => {
                debug!(
                    "PlaybackCoordinator: loading '{}' as {}",
                    track.title(),
                    handle
                );
                self.now_playing = Some(NowPlaying {
                    track,
                    handle,
                    origin,
                });
                self.state = PlaybackState::Loading;
                self.output.play();
                self.sync_follow_up();
                self.publish_snapshot();
                Ok(())
            }
            Err(err) => Err(PlaybackError::TrackLoadFailure {
                track_id: track.id(),
                reason: err.to_string(),
            }),
        }
    }

    /// Counts a failed load. Returns the track to try next, or `None` once
    /// the session went idle.
    fn register_load_failure(&mut self, failure: PlaybackError) -> Option<(Track, Origin)> {
        self.consecutive_load_failures += 1;
        warn!(
            "PlaybackCoordinator: {} ({} in a row)",
            failure, self.consecutive_load_failures
        );
        self.discard_follow_up();

        if self.consecutive_load_failures >= self.load_failure_bound() {
            let attempts = self.consecutive_load_failures;
            self.finish_session();
            self.publish_error(PlaybackError::TooManyLoadFailures { attempts });
            return None;
        }

        match self.take_next_candidate() {
            Some(candidate) => Some(candidate),
            None => {
                self.finish_session();
                self.publish_error(failure);
                None
            }
        }
    }

    fn load_failure_bound(&self) -> usize {
        match self.settings.max_consecutive_load_failures {
            0 => self.cursor.num_tracks().max(1),
            bound => bound,
        }
    }

    /// Picks the next track: the jump queue first, then the playlist.
    fn take_next_candidate(&mut self) -> Option<(Track, Origin)> {
        if let Some(track) = self.jump_queue.dequeue_front() {
            return Some((track, Origin::Jump));
        }
        match self.cursor.advance() {
            Ok(index) => self
                .cursor
                .get_track(index)
                .cloned()
                .map(|track| (track, Origin::Playlist)),
            Err(err) => {
                debug!("PlaybackCoordinator: {}", err);
                None
            }
        }
    }

    fn advance_without_follow_up(&mut self) {
        self.discard_follow_up();
        match self.take_next_candidate() {
            Some((track, origin)) => self.play_candidate(track, origin),
            None => self.finish_session(),
        }
    }

    /// Makes the follow-up item the now-playing one, consuming its source.
    fn commit_follow_up(&mut self) {
        let Some(follow_up) = self.follow_up.take() else {
            return;
        };
        self.superseded_follow_ups.clear();
        self.adopt(follow_up);
    }

    /// Commits a replaced follow-up the engine promoted anyway. Older
    /// replaced entries can no longer be promoted and are dropped; the
    /// current follow-up is still pending behind it.
    fn adopt_superseded(&mut self, handle: LoadHandle) -> bool {
        let Some(index) = self
            .superseded_follow_ups
            .iter()
            .position(|superseded| superseded.handle == handle)
        else {
            return false;
        };
        let Some(adopted) = self.superseded_follow_ups.drain(..=index).last() else {
            return false;
        };
        self.adopt(adopted);
        true
    }

    /// Catches up with an engine that already moved to a prefetched item
    /// whose notification is still on the bus.
    fn adopt_engine_item(&mut self) -> bool {
        let Some(engine_handle) = self.output.current_item_handle() else {
            return false;
        };
        if self.now_playing.is_none() || self.is_current_handle(engine_handle) {
            return false;
        }
        if self
            .follow_up
            .as_ref()
            .is_some_and(|follow_up| follow_up.handle == engine_handle)
        {
            debug!(
                "PlaybackCoordinator: engine already on follow-up {}",
                engine_handle
            );
            self.commit_follow_up();
            true
        } else {
            self.adopt_superseded(engine_handle)
        }
    }

    fn adopt(&mut self, follow_up: FollowUp) {
        match follow_up.origin {
            Origin::Jump => {
                if self.jump_queue.front().map(Track::id) == Some(follow_up.track.id()) {
                    self.jump_queue.dequeue_front();
                } else {
                    self.jump_queue.remove(follow_up.track.id());
                }
            }
            Origin::Playlist => {
                if let Err(err) = self.cursor.advance() {
                    warn!("PlaybackCoordinator: follow-up past playlist end: {}", err);
                }
            }
        }
        self.reset_item_state();
        self.item_observer.arm();
        self.now_playing = Some(NowPlaying {
            track: follow_up.track,
            handle: follow_up.handle,
            origin: follow_up.origin,
        });
        if self.state != PlaybackState::Paused {
            self.state = PlaybackState::Loading;
        }
    }

    fn on_item_confirmed(&mut self, track_id: TrackId) {
        match self.item_observer.observe(Some(track_id), true) {
            ItemEvent::Started(track_id) => self.on_item_started(track_id),
            ItemEvent::Unchanged => {}
            other => trace!("PlaybackCoordinator: unexpected item event {:?}", other),
        }
    }

    fn on_item_started(&mut self, track_id: TrackId) {
        info!("PlaybackCoordinator: now playing {}", track_id);
        self.consecutive_load_failures = 0;
        self.prefetch_enabled = true;
        if self.state == PlaybackState::Loading {
            self.state = PlaybackState::Playing;
        }

        match self.store.increment(track_id) {
            Ok(play_count) => {
                let set_count = |track: &mut Track| track.set_play_count(play_count);
                self.cursor.update_track(track_id, set_count);
                self.jump_queue.update_track(track_id, set_count);
                if let Some(now_playing) = self.now_playing.as_mut() {
                    set_count(&mut now_playing.track);
                }
                self.publish(SessionEvent::PlayCountChanged {
                    track_id,
                    play_count,
                });
            }
            Err(err) => warn!(
                "PlaybackCoordinator: failed to count play of {}: {}",
                track_id, err
            ),
        }

        self.publish(SessionEvent::ItemChanged(Some(track_id)));
        self.sync_follow_up();
        self.publish_snapshot();
    }

    fn on_engine_emptied(&mut self) {
        let content_expected = self.upcoming().is_some();
        match self.item_observer.observe(None, content_expected) {
            ItemEvent::Ended => {
                debug!("PlaybackCoordinator: last item ended");
                self.finish_session();
            }
            ItemEvent::UnexpectedEmpty => {
                debug!("PlaybackCoordinator: engine emptied early, skipping once");
                self.advance_without_follow_up();
            }
            ItemEvent::EmptyLoop => {
                error!("PlaybackCoordinator: engine keeps emptying, giving up");
                self.finish_session();
                self.publish(SessionEvent::Error(
                    "Playback stopped: the output engine keeps emptying".to_string(),
                ));
            }
            other => trace!("PlaybackCoordinator: unexpected item event {:?}", other),
        }
    }

    /// The track `next()` would play.
    fn upcoming(&self) -> Option<(Track, Origin)> {
        if let Some(track) = self.jump_queue.front() {
            return Some((track.clone(), Origin::Jump));
        }
        self.cursor
            .peek_next()
            .map(|track| (track.clone(), Origin::Playlist))
    }

    /// Mirrors the upcoming track into the engine's follow-up slot.
    fn sync_follow_up(&mut self) {
        self.adopt_engine_item();
        let desired = if self.prefetch_enabled && self.now_playing.is_some() {
            self.upcoming()
        } else {
            None
        };

        match desired {
            Some((track, origin)) => {
                let unchanged = self.follow_up.as_ref().is_some_and(|follow_up| {
                    follow_up.track.id() == track.id() && follow_up.origin == origin
                });
                if unchanged {
                    return;
                }
                if let Some(replaced) = self.follow_up.take() {
                    self.superseded_follow_ups.push(replaced);
                }
                match self.output.enqueue_next(&track) {
                    Ok(handle) => {
                        trace!(
                            "PlaybackCoordinator: follow-up '{}' as {}",
                            track.title(),
                            handle
                        );
                        self.follow_up = Some(FollowUp {
                            track,
                            handle,
                            origin,
                        });
                    }
                    Err(err) => {
                        warn!(
                            "PlaybackCoordinator: could not prepare '{}': {}; prefetch disabled",
                            track.title(),
                            err
                        );
                        self.disable_prefetch();
                    }
                }
            }
            None => self.discard_follow_up(),
        }
    }

    fn discard_follow_up(&mut self) {
        if let Some(discarded) = self.follow_up.take() {
            self.output.clear_next();
            self.superseded_follow_ups.push(discarded);
        }
    }

    fn disable_prefetch(&mut self) {
        self.prefetch_enabled = false;
        self.follow_up = None;
        self.output.clear_next();
    }

    fn reset_item_state(&mut self) {
        self.invalidate_seek();
        self.current_time = Duration::ZERO;
        self.duration = None;
        self.duration_observer.reset();
    }

    /// Returns to `Idle`. The playlist snapshot and jump queue survive.
    fn finish_session(&mut self) {
        info!("PlaybackCoordinator: playback finished");
        self.reset_item_state();
        self.discard_follow_up();
        self.output.stop();
        self.superseded_follow_ups.clear();
        self.state = PlaybackState::Idle;
        self.now_playing = None;
        self.item_observer.reset();
        self.consecutive_load_failures = 0;
        self.publish(SessionEvent::ItemChanged(None));
        self.publish(SessionEvent::NowPlayingDeactivated);
        self.publish_snapshot();
    }

    fn is_current_handle(&self, handle: LoadHandle) -> bool {
        self.now_playing
            .as_ref()
            .is_some_and(|now_playing| now_playing.handle == handle)
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.bus_sender.send(Message::Session(event));
    }

    fn publish_error(&self, err: PlaybackError) {
        if err.is_benign() {
            debug!("PlaybackCoordinator: {}", err);
            return;
        }
        self.publish(SessionEvent::Error(err.to_string()));
    }

    fn build_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            current_track: self
                .now_playing
                .as_ref()
                .map(|now_playing| now_playing.track.clone()),
            position: self.cursor.get_playing_track_index(),
            playlist_len: self.cursor.num_tracks(),
            is_playing: self.state.is_playing(),
            current_time: self.current_time,
            duration: self.duration,
            is_sleep_timer_active: self.sleep_timer.is_active(),
            sleep_timer_remaining: self.sleep_timer.remaining(),
            jump_queue: self.jump_queue.iter().cloned().collect(),
        }
    }

    fn refresh_snapshot(&self) {
        let snapshot = self.build_snapshot();
        *self.snapshot.lock().expect("snapshot lock poisoned") = snapshot;
    }

    fn publish_snapshot(&self) {
        let snapshot = self.build_snapshot();
        *self.snapshot.lock().expect("snapshot lock poisoned") = snapshot.clone();
        self.publish(SessionEvent::SnapshotChanged(snapshot));
    }
}
