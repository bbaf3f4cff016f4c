//! Line-oriented command console driving a [`PlaybackHandle`].

use std::{
    io::{self, BufRead, Write},
    time::Duration,
};

use log::debug;
use thiserror::Error;

use crate::{
    db_manager::DbManager,
    error::StoreError,
    playback::PlaybackHandle,
    protocol::PlaybackSource,
    track::{Track, TrackId},
};

const MOST_PLAYED_LIMIT: usize = 10;

const HELP: &str = "\
commands:
  tracks                         list the library (newest first)
  add <title>                    add a track
  playlist new <name>            create a playlist
  playlist add <id> <n>          add library track <n> to a playlist
  playlist list                  list playlists
  play <n> [playlist <id>|top]   play track <n> from the library, a playlist, or most played
  next | prev | pause | resume | toggle
  ff | rew                       seek forward / backward
  seek <secs>                    seek to a position
  queue <n> | unqueue <n>        add to / remove from the play-next queue
  move <from> <to>               reorder the play-next queue (1-based)
  clear                          empty the play-next queue
  delete <n>                     delete a track
  rename <n> <title>             rename a track
  sleep <mins>|1h|off            pause after a delay
  status                         print the session snapshot
  quit";

/// A library track by 1-based listing index or by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRef {
    Index(usize),
    Id(TrackId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceArg {
    Library,
    Playlist(String),
    MostPlayed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Tracks,
    Add(String),
    PlaylistNew(String),
    PlaylistAdd { playlist_id: String, track: TrackRef },
    PlaylistList,
    Play { track: TrackRef, source: SourceArg },
    Next,
    Previous,
    Pause,
    Resume,
    Toggle,
    SeekForward,
    SeekBackward,
    Seek(Duration),
    Queue(TrackRef),
    Unqueue(TrackRef),
    Move { from: usize, to: usize },
    ClearQueue,
    Delete(TrackRef),
    Rename { track: TrackRef, title: String },
    /// `None` cancels the timer.
    Sleep(Option<Duration>),
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("Missing {0}")]
    MissingArgument(&'static str),

    #[error("Invalid {name}: '{value}'")]
    InvalidArgument { name: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No track #{0} in the library")]
    NoSuchTrack(usize),

    #[error("Console I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Could not render status: {0}")]
    Status(#[from] serde_json::Error),
}

/// Parses one console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "tracks" | "ls" => ConsoleCommand::Tracks,
        "add" => ConsoleCommand::Add(rest(&args, 0, "title")?),
        "playlist" => match args.first().copied() {
            Some("new") => ConsoleCommand::PlaylistNew(rest(&args, 1, "playlist name")?),
            Some("add") => ConsoleCommand::PlaylistAdd {
                playlist_id: arg(&args, 1, "playlist id")?.to_string(),
                track: parse_track_ref(arg(&args, 2, "track")?)?,
            },
            Some("list") | None => ConsoleCommand::PlaylistList,
            Some(other) => {
                return Err(CommandError::InvalidArgument {
                    name: "playlist action",
                    value: other.to_string(),
                })
            }
        },
        "play" => ConsoleCommand::Play {
            track: parse_track_ref(arg(&args, 0, "track")?)?,
            source: match args.get(1).copied() {
                None | Some("library") => SourceArg::Library,
                Some("top") => SourceArg::MostPlayed,
                Some("playlist") => {
                    SourceArg::Playlist(arg(&args, 2, "playlist id")?.to_string())
                }
                Some(other) => {
                    return Err(CommandError::InvalidArgument {
                        name: "source",
                        value: other.to_string(),
                    })
                }
            },
        },
        "next" | "n" => ConsoleCommand::Next,
        "prev" | "previous" | "p" => ConsoleCommand::Previous,
        "pause" => ConsoleCommand::Pause,
        "resume" => ConsoleCommand::Resume,
        "toggle" => ConsoleCommand::Toggle,
        "ff" => ConsoleCommand::SeekForward,
        "rew" => ConsoleCommand::SeekBackward,
        "seek" => ConsoleCommand::Seek(parse_seconds(arg(&args, 0, "position")?)?),
        "queue" => ConsoleCommand::Queue(parse_track_ref(arg(&args, 0, "track")?)?),
        "unqueue" => ConsoleCommand::Unqueue(parse_track_ref(arg(&args, 0, "track")?)?),
        "move" => ConsoleCommand::Move {
            from: parse_position(arg(&args, 0, "queue position")?)?,
            to: parse_position(arg(&args, 1, "queue position")?)?,
        },
        "clear" => ConsoleCommand::ClearQueue,
        "delete" | "rm" => ConsoleCommand::Delete(parse_track_ref(arg(&args, 0, "track")?)?),
        "rename" => ConsoleCommand::Rename {
            track: parse_track_ref(arg(&args, 0, "track")?)?,
            title: rest(&args, 1, "title")?,
        },
        "sleep" => ConsoleCommand::Sleep(parse_sleep(arg(&args, 0, "sleep duration")?)?),
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn arg<'a>(args: &[&'a str], index: usize, name: &'static str) -> Result<&'a str, CommandError> {
    args.get(index)
        .copied()
        .ok_or(CommandError::MissingArgument(name))
}

/// Everything from `index` on, re-joined with single spaces.
fn rest(args: &[&str], index: usize, name: &'static str) -> Result<String, CommandError> {
    match args.get(index..) {
        Some(words) if !words.is_empty() => Ok(words.join(" ")),
        _ => Err(CommandError::MissingArgument(name)),
    }
}

fn parse_track_ref(value: &str) -> Result<TrackRef, CommandError> {
    if let Ok(index) = value.parse::<usize>() {
        if index == 0 {
            return Err(CommandError::InvalidArgument {
                name: "track",
                value: value.to_string(),
            });
        }
        return Ok(TrackRef::Index(index));
    }
    value
        .parse::<TrackId>()
        .map(TrackRef::Id)
        .map_err(|_| CommandError::InvalidArgument {
            name: "track",
            value: value.to_string(),
        })
}

fn parse_seconds(value: &str) -> Result<Duration, CommandError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|seconds| *seconds >= 0.0)
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        .ok_or_else(|| CommandError::InvalidArgument {
            name: "position",
            value: value.to_string(),
        })
}

/// 1-based queue position to a 0-based index.
fn parse_position(value: &str) -> Result<usize, CommandError> {
    match value.parse::<usize>() {
        Ok(position) if position > 0 => Ok(position - 1),
        _ => Err(CommandError::InvalidArgument {
            name: "queue position",
            value: value.to_string(),
        }),
    }
}

fn parse_sleep(value: &str) -> Result<Option<Duration>, CommandError> {
    match value {
        "off" | "stop" => Ok(None),
        "1h" => Ok(Some(Duration::from_secs(60 * 60))),
        minutes => match minutes.parse::<u64>().ok().and_then(|m| m.checked_mul(60)) {
            Some(seconds) if seconds > 0 => Ok(Some(Duration::from_secs(seconds))),
            _ => Err(CommandError::InvalidArgument {
                name: "sleep duration",
                value: value.to_string(),
            }),
        },
    }
}

/// Executes console commands against the running coordinator and the
/// library.
pub struct Console {
    handle: PlaybackHandle,
    library: DbManager,
}

impl Console {
    pub fn new(handle: PlaybackHandle, library: DbManager) -> Self {
        Self { handle, library }
    }

    /// Reads commands until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&self, input: R, out: &mut W) -> Result<(), ConsoleError> {
        writeln!(out, "segue ready. type 'help' for commands.")?;
        for line in input.lines() {
            let line = line?;
            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    writeln!(out, "{}", err)?;
                    continue;
                }
            };
            match self.execute(command, out) {
                Ok(true) => {}
                Ok(false) => break,
                Err(ConsoleError::Io(err)) => return Err(ConsoleError::Io(err)),
                Err(err) => writeln!(out, "error: {}", err)?,
            }
        }
        Ok(())
    }

    /// Runs one command. Returns `false` when the console should exit.
    pub fn execute<W: Write>(&self, command: ConsoleCommand, out: &mut W) -> Result<bool, ConsoleError> {
        debug!("Console: {:?}", command);
        match command {
            ConsoleCommand::Tracks => {
                let tracks = self.library.all_tracks()?;
                if tracks.is_empty() {
                    writeln!(out, "library is empty")?;
                }
                for (index, track) in tracks.iter().enumerate() {
                    writeln!(out, "{:>3}. {} ({} plays)", index + 1, track.title(), track.play_count())?;
                }
            }
            ConsoleCommand::Add(title) => {
                let track = self.library.add_track(&title)?;
                writeln!(out, "added '{}' [{}]", track.title(), track.id())?;
            }
            ConsoleCommand::PlaylistNew(name) => {
                let playlist = self.library.create_playlist(&name)?;
                writeln!(out, "created playlist '{}' [{}]", playlist.name, playlist.id)?;
            }
            ConsoleCommand::PlaylistAdd { playlist_id, track } => {
                let track = self.resolve(track)?;
                if self.library.add_to_playlist(&playlist_id, track.id())? {
                    writeln!(out, "added '{}' to {}", track.title(), playlist_id)?;
                } else {
                    writeln!(out, "'{}' is already in {}", track.title(), playlist_id)?;
                }
            }
            ConsoleCommand::PlaylistList => {
                for playlist in self.library.get_all_playlists()? {
                    writeln!(out, "{}  {}", playlist.id, playlist.name)?;
                }
            }
            ConsoleCommand::Play { track, source } => {
                let track = self.resolve(track)?;
                let source = match source {
                    SourceArg::Library => PlaybackSource::Library,
                    SourceArg::Playlist(id) => PlaybackSource::Playlist { id },
                    SourceArg::MostPlayed => PlaybackSource::MostPlayed {
                        limit: MOST_PLAYED_LIMIT,
                    },
                };
                self.handle.play(track.id(), source);
            }
            ConsoleCommand::Next => self.handle.next(),
            ConsoleCommand::Previous => self.handle.previous(),
            ConsoleCommand::Pause => self.handle.pause(),
            ConsoleCommand::Resume => self.handle.resume(),
            ConsoleCommand::Toggle => self.handle.toggle_play_pause(),
            ConsoleCommand::SeekForward => self.handle.seek_forward(),
            ConsoleCommand::SeekBackward => self.handle.seek_backward(),
            ConsoleCommand::Seek(position) => self.handle.seek_to(position),
            ConsoleCommand::Queue(track) => {
                let track = self.resolve(track)?;
                self.handle.enqueue(track.id());
            }
            ConsoleCommand::Unqueue(track) => {
                let track_id = self.resolve_id(track)?;
                self.handle.remove_from_queue(track_id);
            }
            ConsoleCommand::Move { from, to } => self.handle.move_queue_entry(from, to),
            ConsoleCommand::ClearQueue => self.handle.clear_queue(),
            ConsoleCommand::Delete(track) => {
                let track_id = self.resolve_id(track)?;
                self.handle.delete_track(track_id);
            }
            ConsoleCommand::Rename { track, title } => {
                let track_id = self.resolve_id(track)?;
                self.handle.rename_track(track_id, &title);
            }
            ConsoleCommand::Sleep(Some(duration)) => self.handle.set_sleep_timer(duration),
            ConsoleCommand::Sleep(None) => self.handle.stop_sleep_timer(),
            ConsoleCommand::Status => {
                let snapshot = self.handle.snapshot();
                writeln!(out, "{}", serde_json::to_string_pretty(&snapshot)?)?;
                if let Some(remaining) = snapshot.sleep_timer_remaining {
                    writeln!(out, "sleep timer: {}s left", remaining.as_secs())?;
                }
            }
            ConsoleCommand::Help => writeln!(out, "{}", HELP)?,
            ConsoleCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn resolve(&self, track: TrackRef) -> Result<Track, ConsoleError> {
        match track {
            TrackRef::Index(index) => self
                .library
                .all_tracks()?
                .into_iter()
                .nth(index - 1)
                .ok_or(ConsoleError::NoSuchTrack(index)),
            TrackRef::Id(id) => Ok(crate::store::TrackStore::track(&self.library, id)?),
        }
    }

    /// Ids are passed through unchecked; the coordinator reports unknown ones.
    fn resolve_id(&self, track: TrackRef) -> Result<TrackId, ConsoleError> {
        match track {
            TrackRef::Id(id) => Ok(id),
            index => self.resolve(index).map(|track| track.id()),
        }
    }
}
