use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::{utils, warning};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing field `{0}`")]
pub struct MissingField(pub String);

/// CSV column mapping for each exported entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Saved track or playlist item (`{added_at, track}`).
    Track,
    /// Simplified playlist.
    Playlist,
    /// Followed artist.
    Artist,
    /// Saved album (`{added_at, album}`).
    Album,
    /// Saved show (`{added_at, show}`).
    Show,
    /// Saved episode (`{added_at, episode}`).
    Episode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub skipped: usize,
}

impl RecordKind {
    pub fn noun(&self) -> &'static str {
        match self {
            RecordKind::Track => "track",
            RecordKind::Playlist => "playlist",
            RecordKind::Artist => "artist",
            RecordKind::Album => "album",
            RecordKind::Show => "podcast",
            RecordKind::Episode => "episode",
        }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Track => &[
                "Track ID",
                "Album ID",
                "Track Name",
                "Album Name",
                "Artist Name(s)",
                "Release Date",
                "Duration (ms)",
                "Explicity",
                "Album Type",
                "Popularity",
                "Added On",
                "Album Tracks",
                "Track URL",
                "Album URL",
            ],
            RecordKind::Playlist => &["ID", "Spotify URI", "Name", "Description", "Tracks", "URL"],
            RecordKind::Artist => &["ID", "Name", "Type", "Followers", "Popularity", "URL"],
            RecordKind::Album => &[
                "ID",
                "Name",
                "Tracks",
                "Artist Name(s)",
                "Release Date",
                "Label",
                "Type",
                "Popularity",
                "Added On",
                "URL",
            ],
            RecordKind::Show => &[
                "ID",
                "Name",
                "Publisher",
                "Description",
                "Episodes",
                "Type",
                "Explicity",
                "Added On",
                "URL",
            ],
            RecordKind::Episode => &[
                "Episode ID",
                "Show ID",
                "Episode Name",
                "Show Name",
                "Publisher",
                "Description",
                "Release Date",
                "Duration (ms)",
                "Explicity",
                "Show Type",
                "Added On",
                "Episode URL",
                "Show URL",
            ],
        }
    }

    /// Maps a record to its CSV row, in [`headers`](Self::headers) order.
    pub fn row(&self, record: &Value) -> Result<Vec<String>, MissingField> {
        let row = match self {
            RecordKind::Track => vec![
                text(record, "track.id")?,
                text(record, "track.album.id")?,
                text(record, "track.name")?,
                text(record, "track.album.name")?,
                names(record, "track.artists")?,
                text(record, "track.album.release_date")?,
                duration(record, "track.duration_ms")?,
                text(record, "track.explicit")?,
                text(record, "track.album.album_type")?,
                text(record, "track.popularity")?,
                text(record, "added_at")?,
                text(record, "track.album.total_tracks")?,
                text(record, "track.external_urls.spotify")?,
                text(record, "track.album.external_urls.spotify")?,
            ],
            RecordKind::Playlist => vec![
                text(record, "id")?,
                text(record, "uri")?,
                text(record, "name")?,
                text(record, "description")?,
                text(record, "tracks.total")?,
                text(record, "external_urls.spotify")?,
            ],
            RecordKind::Artist => vec![
                text(record, "id")?,
                text(record, "name")?,
                text(record, "type")?,
                text(record, "followers.total")?,
                text(record, "popularity")?,
                text(record, "external_urls.spotify")?,
            ],
            RecordKind::Album => vec![
                text(record, "album.id")?,
                text(record, "album.name")?,
                text(record, "album.total_tracks")?,
                names(record, "album.artists")?,
                text(record, "album.release_date")?,
                text(record, "album.label")?,
                text(record, "album.album_type")?,
                text(record, "album.popularity")?,
                text(record, "added_at")?,
                text(record, "album.external_urls.spotify")?,
            ],
            RecordKind::Show => vec![
                text(record, "show.id")?,
                text(record, "show.name")?,
                text(record, "show.publisher")?,
                text(record, "show.description")?,
                text(record, "show.total_episodes")?,
                text(record, "show.media_type")?,
                text(record, "show.explicit")?,
                text(record, "added_at")?,
                text(record, "show.external_urls.spotify")?,
            ],
            RecordKind::Episode => vec![
                text(record, "episode.id")?,
                text(record, "episode.show.id")?,
                text(record, "episode.name")?,
                text(record, "episode.show.name")?,
                text(record, "episode.show.publisher")?,
                text(record, "episode.description")?,
                text(record, "episode.release_date")?,
                duration(record, "episode.duration_ms")?,
                text(record, "episode.explicit")?,
                text(record, "episode.show.media_type")?,
                text(record, "added_at")?,
                text(record, "episode.external_urls.spotify")?,
                text(record, "episode.show.external_urls.spotify")?,
            ],
        };
        Ok(row)
    }

    /// Human readable name of a record for log messages.
    pub fn label(&self, record: &Value) -> String {
        let path = match self {
            RecordKind::Track => "track.name",
            RecordKind::Playlist | RecordKind::Artist => "name",
            RecordKind::Album => "album.name",
            RecordKind::Show => "show.name",
            RecordKind::Episode => "episode.name",
        };
        lookup(record, path)
            .ok()
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string()
    }
}

/// Writes `records` to a CSV file at `path`.
///
/// Records that miss a required field are logged and skipped; they never
/// abort the file.
pub fn write_csv(path: &Path, kind: RecordKind, records: &[Value]) -> Result<WriteStats, csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(kind.headers())?;

    let mut stats = WriteStats::default();
    for record in records {
        match kind.row(record) {
            Ok(row) => {
                writer.write_record(&row)?;
                stats.written += 1;
            }
            Err(e) => {
                warning!("Failed to load {} {} ({})", kind.noun(), kind.label(record), e);
                stats.skipped += 1;
            }
        }
    }

    writer.flush()?;
    Ok(stats)
}

fn lookup<'a>(record: &'a Value, path: &str) -> Result<&'a Value, MissingField> {
    path.split('.').try_fold(record, |value, key| {
        value.get(key).ok_or_else(|| MissingField(path.to_string()))
    })
}

// A present `null` leaf becomes an empty cell; a missing key skips the record.
fn text(record: &Value, path: &str) -> Result<String, MissingField> {
    Ok(match lookup(record, path)? {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn names(record: &Value, path: &str) -> Result<String, MissingField> {
    let entries = lookup(record, path)?
        .as_array()
        .ok_or_else(|| MissingField(path.to_string()))?;

    Ok(entries
        .iter()
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(", "))
}

fn duration(record: &Value, path: &str) -> Result<String, MissingField> {
    lookup(record, path)?
        .as_u64()
        .map(utils::format_duration_ms)
        .ok_or_else(|| MissingField(path.to_string()))
}
