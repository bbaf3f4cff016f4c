//! Track identity and the validated track record.

use std::{
    fmt,
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use uuid::Uuid;

/// Stable track identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct TrackId(Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TrackId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TrackId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("Track title must not be empty")]
    EmptyTitle,
}

/// One audio item. The title doubles as the media file name.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Track {
    id: TrackId,
    title: String,
    play_count: u32,
    created_at: SystemTime,
}

impl Track {
    /// Creates a brand-new track with a fresh id and zero plays.
    pub fn new(title: &str) -> Result<Self, TrackError> {
        Self::restore(TrackId::new(), title, 0, SystemTime::now())
    }

    /// Rebuilds a track from stored fields.
    pub fn restore(
        id: TrackId,
        title: &str,
        play_count: u32,
        created_at: SystemTime,
    ) -> Result<Self, TrackError> {
        let title = validate_title(title)?;
        Ok(Self {
            id,
            title,
            play_count,
            created_at,
        })
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn play_count(&self) -> u32 {
        self.play_count
    }

    /// Creation time as milliseconds since the unix epoch (storage format).
    pub fn created_at_unix_ms(&self) -> i64 {
        self.created_at
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis().min(i64::MAX as u128) as i64)
            .unwrap_or(0)
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), TrackError> {
        self.title = validate_title(title)?;
        Ok(())
    }

    pub fn set_play_count(&mut self, play_count: u32) {
        self.play_count = play_count;
    }
}

/// Converts a stored unix-millisecond timestamp back into a `SystemTime`.
pub fn system_time_from_unix_ms(unix_ms: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(unix_ms.max(0) as u64)
}

fn validate_title(title: &str) -> Result<String, TrackError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TrackError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_track_trims_title_and_starts_unplayed() {
        let track = Track::new("  song.mp3 ").expect("valid title");
        assert_eq!(track.title(), "song.mp3");
        assert_eq!(track.play_count(), 0);
    }

    #[test]
    fn test_blank_title_is_rejected() {
        assert_eq!(Track::new("   ").unwrap_err(), TrackError::EmptyTitle);
        let mut track = Track::new("a.mp3").expect("valid title");
        assert_eq!(track.set_title(""), Err(TrackError::EmptyTitle));
        assert_eq!(track.title(), "a.mp3");
    }

    #[test]
    fn test_track_id_parses_its_display_form() {
        let id = TrackId::new();
        let parsed: TrackId = id.to_string().parse().expect("uuid should parse");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TrackId>().is_err());
    }

    #[test]
    fn test_created_at_survives_unix_ms_round_trip() {
        let created = system_time_from_unix_ms(1_700_000_000_123);
        let track =
            Track::restore(TrackId::new(), "a.mp3", 4, created).expect("valid title");
        assert_eq!(track.created_at_unix_ms(), 1_700_000_000_123);
        assert_eq!(track.play_count(), 4);
    }
}
