//! Observers that turn raw output-engine notifications into coordinator
//! events. They hold no shared state: the coordinator owns them and feeds
//! them only from inside its own thread.

pub(crate) mod duration_observer;
pub(crate) mod item_observer;
pub(crate) mod time_observer;

pub use duration_observer::DurationObserver;
pub use item_observer::{ItemChangeObserver, ItemEvent};
pub use time_observer::TimeObserver;
