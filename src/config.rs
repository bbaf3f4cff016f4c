//! Persistent application configuration model and defaults.

use std::{path::PathBuf, time::Duration};

/// Root configuration persisted to `segue.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Navigation, seek, and failure-bound tuning.
    pub playback: PlaybackConfig,
    #[serde(default)]
    /// Headless output engine behavior.
    pub output: OutputConfig,
    #[serde(default)]
    /// Track library location.
    pub storage: StorageConfig,
    #[serde(default)]
    /// Log verbosity.
    pub logging: LoggingConfig,
}

/// Playback coordination preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    /// Step used by seek forward/backward.
    #[serde(default = "default_seek_step_secs")]
    pub seek_step_secs: u64,
    /// From this far into a track, "previous" restarts it instead.
    #[serde(default = "default_restart_threshold_secs")]
    pub restart_threshold_secs: u64,
    /// Minimum spacing of published positions.
    #[serde(default = "default_position_interval_ms")]
    pub position_interval_ms: u64,
    /// Consecutive load failures tolerated before giving up.
    /// `0` means "the length of the active playlist".
    #[serde(default)]
    pub max_consecutive_load_failures: usize,
    #[serde(default = "default_max_consecutive_empty_transitions")]
    pub max_consecutive_empty_transitions: usize,
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

/// Headless output engine preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Length given to every simulated item.
    #[serde(default = "default_simulated_track_secs")]
    pub simulated_track_secs: u64,
    /// When set, tracks whose `media_dir/title` file is missing fail to load.
    #[serde(default)]
    pub media_dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct StorageConfig {
    /// SQLite file; defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl PlaybackConfig {
    pub fn seek_step(&self) -> Duration {
        Duration::from_secs(self.seek_step_secs)
    }

    pub fn restart_threshold(&self) -> Duration {
        Duration::from_secs(self.restart_threshold_secs)
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms)
    }
}

impl OutputConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn simulated_track_length(&self) -> Duration {
        Duration::from_secs(self.simulated_track_secs)
    }

    pub fn media_dir_path(&self) -> Option<PathBuf> {
        self.media_dir
            .as_deref()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
    }
}

impl StorageConfig {
    pub fn database_file(&self) -> Option<PathBuf> {
        self.database_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.trim().parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            seek_step_secs: default_seek_step_secs(),
            restart_threshold_secs: default_restart_threshold_secs(),
            position_interval_ms: default_position_interval_ms(),
            max_consecutive_load_failures: 0,
            max_consecutive_empty_transitions: default_max_consecutive_empty_transitions(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            simulated_track_secs: default_simulated_track_secs(),
            media_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Clamps every value into a range the runtime can work with.
pub fn sanitize_config(config: Config) -> Config {
    let Config {
        playback,
        output,
        storage,
        logging,
    } = config;

    Config {
        playback: PlaybackConfig {
            seek_step_secs: playback.seek_step_secs.clamp(1, 300),
            restart_threshold_secs: playback.restart_threshold_secs.min(60),
            position_interval_ms: playback.position_interval_ms.clamp(50, 10_000),
            max_consecutive_load_failures: playback.max_consecutive_load_failures,
            max_consecutive_empty_transitions: playback.max_consecutive_empty_transitions.max(2),
            bus_capacity: playback.bus_capacity.clamp(64, 65_536),
        },
        output: OutputConfig {
            tick_interval_ms: output.tick_interval_ms.clamp(10, 1_000),
            simulated_track_secs: output.simulated_track_secs.max(1),
            media_dir: output.media_dir,
        },
        storage,
        logging,
    }
}

fn default_seek_step_secs() -> u64 {
    15
}

fn default_restart_threshold_secs() -> u64 {
    5
}

fn default_position_interval_ms() -> u64 {
    500
}

fn default_max_consecutive_empty_transitions() -> usize {
    2
}

fn default_bus_capacity() -> usize {
    1024
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_simulated_track_secs() -> u64 {
    180
}

fn default_log_level() -> String {
    "info".to_string()
}
