//! Playback session coordination for a music library: an ordered playlist
//! with gap-aware cursor, a play-next queue, gapless follow-up prefetch,
//! and a sleep timer, all serialized through one coordinator on a shared
//! event bus.

pub mod app_bootstrap;
pub mod config;
pub mod config_persistence;
pub mod console;
pub mod db_manager;
pub mod error;
pub mod jump_queue;
pub mod observer;
pub mod output;
pub mod playback;
pub mod playlist;
pub mod protocol;
pub mod sleep_timer;
pub mod store;
pub mod track;
