use std::{any::Any, thread};

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{self, error::RecvError, Receiver};

use crate::{
    config::Config,
    db_manager::DbManager,
    output::headless::HeadlessOutput,
    playback::{PlaybackCoordinator, PlaybackHandle},
    protocol::{Message, PlaybackMessage, SessionEvent},
};

pub struct BackgroundServicesConfig {
    pub bus_sender: broadcast::Sender<Message>,
    pub config: Config,
    pub store: DbManager,
}

/// Running coordinator plus the handle used to drive it.
pub struct BackgroundServices {
    pub handle: PlaybackHandle,
    coordinator: Option<thread::JoinHandle<()>>,
}

impl BackgroundServices {
    /// Asks the coordinator to stop and waits for it.
    pub fn shutdown(mut self) {
        self.handle.shutdown();
        if let Some(coordinator) = self.coordinator.take() {
            if coordinator.join().is_err() {
                error!("PlaybackCoordinator thread did not shut down cleanly");
            }
        }
    }
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

pub fn spawn_background_services(config: BackgroundServicesConfig) -> BackgroundServices {
    let BackgroundServicesConfig {
        bus_sender,
        config,
        store,
    } = config;

    let session_logger_receiver = bus_sender.subscribe();
    thread::spawn(move || log_session_events(session_logger_receiver));

    let coordinator_bus_receiver = bus_sender.subscribe();
    let coordinator_bus_sender = bus_sender.clone();
    let output = HeadlessOutput::from_config(bus_sender.clone(), &config.output);
    let mut coordinator = PlaybackCoordinator::new(
        coordinator_bus_receiver,
        coordinator_bus_sender,
        Box::new(output),
        store,
        config.playback.clone(),
    );
    let handle = PlaybackHandle::new(bus_sender, coordinator.snapshot_cell());

    let coordinator = thread::spawn(move || {
        let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            coordinator.run();
        }));
        if let Err(payload) = run_result {
            error!(
                "PlaybackCoordinator thread terminated due to panic: {}",
                panic_payload_to_string(payload.as_ref())
            );
        }
    });

    BackgroundServices {
        handle,
        coordinator: Some(coordinator),
    }
}

/// Mirrors session events into the log until the coordinator shuts down.
fn log_session_events(mut receiver: Receiver<Message>) {
    loop {
        match receiver.blocking_recv() {
            Ok(Message::Session(event)) => match event {
                SessionEvent::ItemChanged(Some(track_id)) => info!("Session: now playing {}", track_id),
                SessionEvent::ItemChanged(None) => debug!("Session: nothing playing"),
                SessionEvent::NowPlayingDeactivated => info!("Session: playback finished"),
                SessionEvent::SleepTimerChanged(active) => {
                    info!("Session: sleep timer {}", if active { "on" } else { "off" })
                }
                SessionEvent::PlayCountChanged {
                    track_id,
                    play_count,
                } => debug!("Session: {} played {} time(s)", track_id, play_count),
                SessionEvent::DurationChanged(duration) => {
                    debug!("Session: duration {:?}", duration)
                }
                SessionEvent::Error(message) => warn!("Session: {}", message),
                SessionEvent::PositionChanged(_) | SessionEvent::SnapshotChanged(_) => {}
            },
            Ok(Message::Playback(PlaybackMessage::Shutdown)) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!("Session logger lagged, skipped {} message(s)", skipped)
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::OutputConfig, playback::PlaybackState, protocol::PlaybackSource};
    use std::time::{Duration, Instant};

    #[test]
    fn test_services_play_from_library_and_shut_down() {
        let store = DbManager::new_in_memory().expect("failed to create in-memory db");
        let track = store.add_track("opener").expect("insert");
        let mut config = Config::default();
        config.output = OutputConfig {
            tick_interval_ms: 10,
            ..OutputConfig::default()
        };

        let (bus_sender, _) = broadcast::channel(1024);
        let services = spawn_background_services(BackgroundServicesConfig {
            bus_sender,
            config,
            store,
        });
        services.handle.play(track.id(), PlaybackSource::Library);

        let start = Instant::now();
        while services.handle.snapshot().state != PlaybackState::Playing {
            assert!(
                start.elapsed() < Duration::from_secs(2),
                "coordinator never started playing"
            );
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            services.handle.snapshot().current_track_id(),
            Some(track.id())
        );
        services.shutdown();
    }
}
