//! Output engine that keeps time without rendering audio.

use std::{
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use log::{debug, trace, warn};
use tokio::sync::broadcast::Sender;

use super::{LoadHandle, OutputBridge, OutputError};
use crate::{
    config::OutputConfig,
    protocol::{Message, OutputEvent},
    track::{Track, TrackId},
};

#[derive(Debug, Clone, Copy)]
struct EngineItem {
    handle: LoadHandle,
    track_id: TrackId,
    length: Duration,
}

#[derive(Debug, Default)]
struct EngineState {
    current: Option<EngineItem>,
    pending: Option<EngineItem>,
    position: Duration,
    playing: bool,
}

impl EngineState {
    /// Ends the current item and promotes the pending one, if any.
    fn finish_current(&mut self) -> Vec<OutputEvent> {
        let Some(ended) = self.current.take() else {
            return Vec::new();
        };
        self.position = Duration::ZERO;
        match self.pending.take() {
            Some(next) => {
                self.current = Some(next);
                vec![
                    OutputEvent::ItemChanged {
                        handle: next.handle,
                        item: Some(next.track_id),
                    },
                    OutputEvent::DurationChanged {
                        handle: next.handle,
                        seconds: next.length.as_secs_f64(),
                    },
                ]
            }
            None => {
                self.playing = false;
                vec![OutputEvent::ItemChanged {
                    handle: ended.handle,
                    item: None,
                }]
            }
        }
    }

    fn tick(&mut self, elapsed: Duration) -> Vec<OutputEvent> {
        if !self.playing {
            return Vec::new();
        }
        let Some(current) = self.current else {
            return Vec::new();
        };
        self.position = self.position.saturating_add(elapsed).min(current.length);
        if self.position >= current.length {
            return self.finish_current();
        }
        vec![OutputEvent::PositionTick {
            handle: current.handle,
            seconds: self.position.as_secs_f64(),
        }]
    }
}

/// [`OutputBridge`] driven by a wall clock instead of an audio device.
///
/// Every item lasts `track_length`. A clock thread advances the active item
/// while playing and posts engine notifications on the bus.
pub struct HeadlessOutput {
    bus_sender: Sender<Message>,
    engine: Arc<Mutex<EngineState>>,
    stop_clock: Option<mpsc::Sender<()>>,
    next_handle: u64,
    track_length: Duration,
    media_dir: Option<PathBuf>,
    clock: Option<thread::JoinHandle<()>>,
}

impl HeadlessOutput {
    pub fn new(
        bus_sender: Sender<Message>,
        tick_interval: Duration,
        track_length: Duration,
        media_dir: Option<PathBuf>,
    ) -> Self {
        let engine = Arc::new(Mutex::new(EngineState::default()));
        let (stop_clock, clock_stopped) = mpsc::channel::<()>();

        let clock_engine = engine.clone();
        let clock_sender = bus_sender.clone();
        let clock = thread::spawn(move || {
            let mut last_tick = Instant::now();
            while let Err(RecvTimeoutError::Timeout) = clock_stopped.recv_timeout(tick_interval) {
                let now = Instant::now();
                let elapsed = now.duration_since(last_tick);
                last_tick = now;

                let mut engine = clock_engine.lock().expect("engine state lock poisoned");
                let events = engine.tick(elapsed);
                post_all(&clock_sender, events);
            }
            trace!("HeadlessOutput: clock stopped");
        });

        debug!(
            "HeadlessOutput: started. tick={:?} track_length={:?} media_dir={:?}",
            tick_interval, track_length, media_dir
        );

        Self {
            bus_sender,
            engine,
            stop_clock: Some(stop_clock),
            next_handle: 0,
            track_length,
            media_dir,
            clock: Some(clock),
        }
    }

    pub fn from_config(bus_sender: Sender<Message>, config: &OutputConfig) -> Self {
        Self::new(
            bus_sender,
            config.tick_interval(),
            config.simulated_track_length(),
            config.media_dir_path(),
        )
    }

    fn allocate_handle(&mut self) -> LoadHandle {
        self.next_handle += 1;
        LoadHandle(self.next_handle)
    }

    fn ensure_running(&self) -> Result<(), OutputError> {
        if self.stop_clock.is_some() {
            Ok(())
        } else {
            Err(OutputError::NotReady("engine shut down".to_string()))
        }
    }

    /// Reason the track cannot be rendered, if any.
    fn missing_media(&self, track: &Track) -> Option<String> {
        let media_dir = self.media_dir.as_deref()?;
        let media_path = media_path(media_dir, track.title());
        if media_path.is_file() {
            None
        } else {
            Some(format!("no media file at {}", media_path.display()))
        }
    }

    fn lock_engine(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.engine.lock().expect("engine state lock poisoned")
    }

    pub fn shutdown(&mut self) {
        self.stop_clock = None;
        if let Some(clock) = self.clock.take() {
            if clock.join().is_err() {
                warn!("HeadlessOutput: clock thread panicked");
            }
        }
    }
}

fn media_path(media_dir: &Path, title: &str) -> PathBuf {
    media_dir.join(title)
}

fn post_all(bus_sender: &Sender<Message>, events: Vec<OutputEvent>) {
    for event in events {
        let _ = bus_sender.send(Message::Output(event));
    }
}

impl OutputBridge for HeadlessOutput {
    fn load(&mut self, track: &Track) -> Result<LoadHandle, OutputError> {
        self.ensure_running()?;
        let handle = self.allocate_handle();
        let missing = self.missing_media(track);
        let track_length = self.track_length;

        let mut engine = self.lock_engine();
        engine.pending = None;
        engine.position = Duration::ZERO;
        engine.playing = false;

        let events = match missing {
            Some(reason) => {
                debug!("HeadlessOutput: load {} failed: {}", handle, reason);
                engine.current = None;
                vec![OutputEvent::ItemFailed {
                    handle,
                    track_id: track.id(),
                    reason,
                }]
            }
            None => {
                debug!("HeadlessOutput: loaded '{}' as {}", track.title(), handle);
                engine.current = Some(EngineItem {
                    handle,
                    track_id: track.id(),
                    length: track_length,
                });
                vec![
                    OutputEvent::ItemChanged {
                        handle,
                        item: Some(track.id()),
                    },
                    OutputEvent::DurationChanged {
                        handle,
                        seconds: track_length.as_secs_f64(),
                    },
                ]
            }
        };
        post_all(&self.bus_sender, events);
        Ok(handle)
    }

    fn enqueue_next(&mut self, track: &Track) -> Result<LoadHandle, OutputError> {
        self.ensure_running()?;
        if let Some(reason) = self.missing_media(track) {
            debug!("HeadlessOutput: refusing follow-up: {}", reason);
            return Err(OutputError::Unavailable(track.title().to_string()));
        }
        let handle = self.allocate_handle();
        let track_length = self.track_length;
        self.lock_engine().pending = Some(EngineItem {
            handle,
            track_id: track.id(),
            length: track_length,
        });
        trace!("HeadlessOutput: follow-up '{}' as {}", track.title(), handle);
        Ok(handle)
    }

    fn clear_next(&mut self) {
        self.lock_engine().pending = None;
    }

    fn advance_to_next(&mut self) {
        let mut engine = self.lock_engine();
        let events = engine.finish_current();
        post_all(&self.bus_sender, events);
    }

    fn play(&mut self) {
        let mut engine = self.lock_engine();
        engine.playing = engine.current.is_some();
    }

    fn pause(&mut self) {
        self.lock_engine().playing = false;
    }

    fn seek(&mut self, position: Duration, generation: u64) {
        let mut engine = self.lock_engine();
        let succeeded = match engine.current {
            Some(current) => {
                engine.position = position.min(current.length);
                true
            }
            None => false,
        };
        post_all(
            &self.bus_sender,
            vec![OutputEvent::SeekCompleted {
                generation,
                succeeded,
            }],
        );
    }

    fn current_position(&self) -> Duration {
        self.lock_engine().position
    }

    fn current_item_duration(&self) -> Option<Duration> {
        self.lock_engine().current.map(|item| item.length)
    }

    fn current_item_identity(&self) -> Option<TrackId> {
        self.lock_engine().current.map(|item| item.track_id)
    }

    fn current_item_handle(&self) -> Option<LoadHandle> {
        self.lock_engine().current.map(|item| item.handle)
    }

    fn stop(&mut self) {
        let mut engine = self.lock_engine();
        *engine = EngineState::default();
    }
}

impl Drop for HeadlessOutput {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::{self, error::TryRecvError, Receiver};

    const QUIET_CLOCK: Duration = Duration::from_secs(3600);

    fn track(title: &str) -> Track {
        Track::new(title).expect("valid title")
    }

    fn drain(receiver: &mut Receiver<Message>) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(Message::Output(event)) => events.push(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }

    fn wait_for<F>(receiver: &mut Receiver<Message>, timeout: Duration, mut predicate: F) -> OutputEvent
    where
        F: FnMut(&OutputEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match receiver.try_recv() {
                Ok(Message::Output(event)) if predicate(&event) => return event,
                Ok(_) => {}
                Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(2)),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => break,
            }
        }
        panic!("timed out waiting for output event");
    }

    fn item(handle: u64, length_ms: u64) -> EngineItem {
        EngineItem {
            handle: LoadHandle(handle),
            track_id: TrackId::new(),
            length: Duration::from_millis(length_ms),
        }
    }

    #[test]
    fn test_tick_reports_position_only_while_playing() {
        let mut state = EngineState {
            current: Some(item(1, 1000)),
            ..EngineState::default()
        };
        assert!(state.tick(Duration::from_millis(100)).is_empty());

        state.playing = true;
        let events = state.tick(Duration::from_millis(250));
        assert!(matches!(
            events.as_slice(),
            [OutputEvent::PositionTick { handle: LoadHandle(1), seconds }] if (*seconds - 0.25).abs() < 1e-9
        ));
    }

    #[test]
    fn test_tick_past_end_promotes_pending_item() {
        let pending = item(2, 1000);
        let mut state = EngineState {
            current: Some(item(1, 100)),
            pending: Some(pending),
            playing: true,
            ..EngineState::default()
        };
        let events = state.tick(Duration::from_millis(150));
        assert!(matches!(
            events.as_slice(),
            [
                OutputEvent::ItemChanged { handle: LoadHandle(2), item: Some(id) },
                OutputEvent::DurationChanged { handle: LoadHandle(2), .. },
            ] if *id == pending.track_id
        ));
        assert!(state.playing);
        assert_eq!(state.position, Duration::ZERO);
    }

    #[test]
    fn test_tick_past_end_without_pending_empties_engine() {
        let mut state = EngineState {
            current: Some(item(1, 100)),
            playing: true,
            ..EngineState::default()
        };
        let events = state.tick(Duration::from_millis(100));
        assert!(matches!(
            events.as_slice(),
            [OutputEvent::ItemChanged { handle: LoadHandle(1), item: None }]
        ));
        assert!(state.current.is_none());
        assert!(!state.playing);
        assert!(state.tick(Duration::from_millis(100)).is_empty());
    }

    #[test]
    fn test_load_posts_item_and_duration() {
        let (bus_sender, mut receiver) = broadcast::channel(64);
        let mut output = HeadlessOutput::new(bus_sender, QUIET_CLOCK, Duration::from_secs(90), None);
        let a = track("a");

        let handle = output.load(&a).expect("load should succeed");
        let events = drain(&mut receiver);
        assert!(matches!(
            events.as_slice(),
            [
                OutputEvent::ItemChanged { handle: h1, item: Some(id) },
                OutputEvent::DurationChanged { handle: h2, seconds },
            ] if *h1 == handle && *h2 == handle && *id == a.id() && *seconds == 90.0
        ));
        assert_eq!(output.current_item_identity(), Some(a.id()));
        assert_eq!(output.current_item_duration(), Some(Duration::from_secs(90)));
        assert_ne!(output.load(&a).expect("reload"), handle);
    }

    #[test]
    fn test_missing_media_fails_load_and_refuses_follow_up() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("present"), b"").expect("write media");
        let (bus_sender, mut receiver) = broadcast::channel(64);
        let mut output = HeadlessOutput::new(
            bus_sender,
            QUIET_CLOCK,
            Duration::from_secs(90),
            Some(dir.path().to_path_buf()),
        );

        let absent = track("absent");
        let handle = output.load(&absent).expect("load is accepted");
        let events = drain(&mut receiver);
        assert!(matches!(
            events.as_slice(),
            [OutputEvent::ItemFailed { handle: h, track_id, .. }] if *h == handle && *track_id == absent.id()
        ));
        assert_eq!(output.current_item_identity(), None);

        output.load(&track("present")).expect("present media loads");
        assert!(matches!(
            output.enqueue_next(&absent),
            Err(OutputError::Unavailable(_))
        ));
    }

    #[test]
    fn test_seek_clamps_and_acknowledges_generation() {
        let (bus_sender, mut receiver) = broadcast::channel(64);
        let mut output = HeadlessOutput::new(bus_sender, QUIET_CLOCK, Duration::from_secs(60), None);

        output.seek(Duration::from_secs(5), 1);
        assert!(matches!(
            drain(&mut receiver).as_slice(),
            [OutputEvent::SeekCompleted { generation: 1, succeeded: false }]
        ));

        output.load(&track("a")).expect("load");
        drain(&mut receiver);
        output.seek(Duration::from_secs(600), 2);
        assert!(matches!(
            drain(&mut receiver).as_slice(),
            [OutputEvent::SeekCompleted { generation: 2, succeeded: true }]
        ));
        assert_eq!(output.current_position(), Duration::from_secs(60));
    }

    #[test]
    fn test_advance_to_next_uses_follow_up() {
        let (bus_sender, mut receiver) = broadcast::channel(64);
        let mut output = HeadlessOutput::new(bus_sender, QUIET_CLOCK, Duration::from_secs(60), None);
        let a = track("a");
        let b = track("b");

        output.load(&a).expect("load");
        let follow_up = output.enqueue_next(&b).expect("enqueue");
        drain(&mut receiver);

        output.advance_to_next();
        assert_eq!(output.current_item_handle(), Some(follow_up));
        let events = drain(&mut receiver);
        assert!(matches!(
            events.first(),
            Some(OutputEvent::ItemChanged { handle, item: Some(id) }) if *handle == follow_up && *id == b.id()
        ));

        output.clear_next();
        let current = follow_up;
        output.advance_to_next();
        assert!(matches!(
            drain(&mut receiver).as_slice(),
            [OutputEvent::ItemChanged { handle, item: None }] if *handle == current
        ));
        assert_eq!(output.current_item_handle(), None);
    }

    #[test]
    fn test_clock_plays_through_to_follow_up() {
        let (bus_sender, mut receiver) = broadcast::channel(256);
        let mut output = HeadlessOutput::new(
            bus_sender,
            Duration::from_millis(5),
            Duration::from_millis(60),
            None,
        );
        let a = track("a");
        let b = track("b");

        output.load(&a).expect("load");
        let follow_up = output.enqueue_next(&b).expect("enqueue");
        output.play();

        wait_for(&mut receiver, Duration::from_secs(2), |event| {
            matches!(event, OutputEvent::PositionTick { .. })
        });
        let changed = wait_for(&mut receiver, Duration::from_secs(2), |event| {
            matches!(event, OutputEvent::ItemChanged { handle, .. } if *handle == follow_up)
        });
        assert!(matches!(changed, OutputEvent::ItemChanged { item: Some(id), .. } if id == b.id()));

        output.stop();
        assert_eq!(output.current_item_identity(), None);
        output.shutdown();
        assert!(matches!(output.load(&a), Err(OutputError::NotReady(_))));
    }
}
