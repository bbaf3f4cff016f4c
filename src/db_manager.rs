use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::{
    error::StoreError,
    protocol::PlaybackSource,
    store::{PlayCountSink, TrackStore},
    track::{system_time_from_unix_ms, Track, TrackId},
};

/// Playlist metadata row.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct PlaylistInfo {
    /// Stable playlist id.
    pub id: String,
    /// User-visible name.
    pub name: String,
}

type TrackRow = (String, String, i64, i64);

const TRACK_COLUMNS: &str = "tracks.id, tracks.title, tracks.plays, tracks.created_at";

/// SQLite-backed track library, playlists, and play counts.
pub struct DbManager {
    conn: Connection,
}

impl DbManager {
    /// Opens `path`, or `library.db` under the platform data directory.
    pub fn new(path: Option<PathBuf>) -> Result<Self, StoreError> {
        let db_path = match path {
            Some(path) => path,
            None => {
                let data_dir = dirs::data_dir()
                    .unwrap_or_else(std::env::temp_dir)
                    .join("segue");
                if !data_dir.exists() {
                    std::fs::create_dir_all(&data_dir)?;
                }
                data_dir.join("library.db")
            }
        };

        info!("DbManager: opening {}", db_path.display());
        let conn = Connection::open(db_path)?;
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        Ok(db_manager)
    }

    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db_manager = Self { conn };
        db_manager.initialize_schema()?;
        Ok(db_manager)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                plays INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS playlists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS playlist_tracks (
                playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
                track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                PRIMARY KEY (playlist_id, track_id)
            );",
        )
    }

    /// Adds a new library track.
    pub fn add_track(&self, title: &str) -> Result<Track, StoreError> {
        let track = Track::new(title)?;
        self.conn.execute(
            "INSERT INTO tracks (id, title, plays, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                track.id().to_string(),
                track.title(),
                track.play_count() as i64,
                track.created_at_unix_ms()
            ],
        )?;
        Ok(track)
    }

    /// Every library track, newest first.
    pub fn all_tracks(&self) -> Result<Vec<Track>, StoreError> {
        self.query_tracks(
            &format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY created_at DESC, rowid DESC"),
            params![],
        )
    }

    pub fn create_playlist(&self, name: &str) -> Result<PlaylistInfo, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0);
        self.conn.execute(
            "INSERT INTO playlists (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, name, created_at],
        )?;
        Ok(PlaylistInfo {
            id,
            name: name.to_string(),
        })
    }

    /// Playlists in creation order.
    pub fn get_all_playlists(&self) -> Result<Vec<PlaylistInfo>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM playlists ORDER BY created_at ASC, rowid ASC")?;
        let playlist_iter = stmt.query_map([], |row| {
            Ok(PlaylistInfo {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut playlists = Vec::new();
        for playlist in playlist_iter {
            playlists.push(playlist?);
        }
        Ok(playlists)
    }

    /// Adds a track to a playlist. Returns `false` when it was already there.
    pub fn add_to_playlist(&self, playlist_id: &str, track_id: TrackId) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO playlist_tracks (playlist_id, track_id) VALUES (?1, ?2)",
            params![playlist_id, track_id.to_string()],
        )?;
        Ok(inserted > 0)
    }

    /// Tracks of one playlist, ordered by title.
    pub fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, StoreError> {
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} FROM tracks
                 JOIN playlist_tracks ON playlist_tracks.track_id = tracks.id
                 WHERE playlist_tracks.playlist_id = ?1
                 ORDER BY tracks.title ASC"
            ),
            params![playlist_id],
        )
    }

    /// Tracks with at least one play, most played first.
    pub fn most_played(&self, limit: usize) -> Result<Vec<Track>, StoreError> {
        self.query_tracks(
            &format!(
                "SELECT {TRACK_COLUMNS} FROM tracks WHERE plays > 0
                 ORDER BY plays DESC, title ASC LIMIT ?1"
            ),
            params![limit.min(i64::MAX as usize) as i64],
        )
    }

    fn query_tracks(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Track>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| -> rusqlite::Result<TrackRow> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;

        let mut tracks = Vec::new();
        for row in rows {
            tracks.push(track_from_row(row?)?);
        }
        Ok(tracks)
    }
}

fn track_from_row((id, title, plays, created_at): TrackRow) -> Result<Track, StoreError> {
    let id = id
        .parse::<TrackId>()
        .map_err(|err| StoreError::InvalidRow(format!("bad track id '{}': {}", id, err)))?;
    let plays = plays.clamp(0, u32::MAX as i64) as u32;
    Ok(Track::restore(
        id,
        &title,
        plays,
        system_time_from_unix_ms(created_at),
    )?)
}

impl TrackStore for DbManager {
    fn tracks_for(&self, source: &PlaybackSource) -> Result<Vec<Track>, StoreError> {
        match source {
            PlaybackSource::Library => self.all_tracks(),
            PlaybackSource::Playlist { id } => self.playlist_tracks(id),
            PlaybackSource::MostPlayed { limit } => self.most_played(*limit),
        }
    }

    fn track(&self, id: TrackId) -> Result<Track, StoreError> {
        let row: Option<TrackRow> = self
            .conn
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"),
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        match row {
            Some(row) => track_from_row(row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    fn delete(&self, id: TrackId) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM tracks WHERE id = ?1", params![id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn rename(&self, id: TrackId, title: &str) -> Result<(), StoreError> {
        let mut track = self.track(id)?;
        track.set_title(title)?;
        self.conn.execute(
            "UPDATE tracks SET title = ?1 WHERE id = ?2",
            params![track.title(), id.to_string()],
        )?;
        Ok(())
    }
}

impl PlayCountSink for DbManager {
    fn increment(&self, id: TrackId) -> Result<u32, StoreError> {
        let plays: Option<i64> = self
            .conn
            .query_row(
                "UPDATE tracks SET plays = plays + 1 WHERE id = ?1 RETURNING plays",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match plays {
            Some(plays) => Ok(plays.clamp(0, u32::MAX as i64) as u32),
            None => Err(StoreError::NotFound(id)),
        }
    }
}
