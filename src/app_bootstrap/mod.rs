//! Process wiring: spawns the long-lived runtime components.

pub mod services;
