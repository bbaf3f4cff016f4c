//! Playback session coordination: the coordinator that owns the session,
//! the handle other components use to drive it, and the published state.

mod coordinator;
mod handle;
pub mod session;

pub use coordinator::PlaybackCoordinator;
pub use handle::PlaybackHandle;
pub use session::{PlaybackState, SessionSnapshot};
