//! Single-shot, cancelable deferred pause.

use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use log::debug;
use tokio::sync::broadcast::Sender;

use crate::protocol::{Message, PlaybackMessage};

/// Posts `SleepTimerFired { generation }` on the bus once its duration
/// elapses.
///
/// Each `start` bumps the generation and drops the previous timer's cancel
/// channel, which wakes and retires its thread without firing. A fire that
/// still slips through carries an outdated generation and is refused by
/// [`SleepTimer::fire`].
pub struct SleepTimer {
    bus_sender: Sender<Message>,
    generation: u64,
    cancel: Option<mpsc::Sender<()>>,
    deadline: Option<Instant>,
}

impl SleepTimer {
    pub fn new(bus_sender: Sender<Message>) -> Self {
        Self {
            bus_sender,
            generation: 0,
            cancel: None,
            deadline: None,
        }
    }

    /// Replaces any running timer. Returns the new generation.
    pub fn start(&mut self, duration: Duration) -> u64 {
        self.stop();
        let generation = self.generation;
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let bus_sender = self.bus_sender.clone();

        thread::spawn(move || match cancel_rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => {
                debug!("SleepTimer: generation {} elapsed", generation);
                let _ = bus_sender.send(Message::Playback(PlaybackMessage::SleepTimerFired {
                    generation,
                }));
            }
            _ => debug!("SleepTimer: generation {} cancelled", generation),
        });

        self.cancel = Some(cancel_tx);
        self.deadline = Instant::now().checked_add(duration);
        generation
    }

    /// Cancels the running timer. Returns whether one was active.
    pub fn stop(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        self.deadline = None;
        self.cancel.take().is_some()
    }

    /// Accepts a fire notification. Only the live generation is accepted,
    /// and only once.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.cancel.is_none() || generation != self.generation {
            return false;
        }
        self.cancel = None;
        self.deadline = None;
        true
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Time left before the timer fires. `None` when idle, or when the
    /// duration is too far out to be represented as an instant.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
