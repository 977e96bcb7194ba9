//! # Backup Module
//!
//! Export orchestration. An [`Exporter`] receives an authenticated
//! [`SpotifyClient`], a [`BackupLayout`] and [`ExportOptions`] and walks the
//! library category by category:
//!
//! 1. current user profile (`me`)
//! 2. liked songs
//! 3. playlists, split into owned and foreign ones, plus their tracks
//! 4. followed artists
//! 5. saved albums
//! 6. saved podcast shows and episodes
//!
//! Each category is fetched to completion before the next starts. Fetch
//! failures abort the export; malformed records are skipped while writing.

pub mod healthcheck;
mod layout;
mod records;

use std::{io, path::PathBuf, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use thiserror::Error;

pub use layout::BackupLayout;
pub use records::{MissingField, RecordKind, WriteStats, write_csv};

use crate::{
    info,
    spotify::{ApiError, SpotifyClient},
    success, utils, warning,
};

const PAGE_LIMIT: &str = "50";
const PLAYLIST_TRACKS_LIMIT: &str = "100";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("cannot create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Also export the tracks of playlists the user follows but doesn't own.
    pub include_foreign_playlists: bool,
}

/// One written CSV file.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub category: String,
    pub file: PathBuf,
    pub stats: WriteStats,
}

pub struct Exporter {
    client: SpotifyClient,
    layout: BackupLayout,
    options: ExportOptions,
}

impl Exporter {
    pub fn new(client: SpotifyClient, layout: BackupLayout, options: ExportOptions) -> Self {
        Self {
            client,
            layout,
            options,
        }
    }

    pub async fn run(&self) -> Result<Vec<ExportSummary>, BackupError> {
        info!("Loading user info...");
        let me = self.client.current_user().await?;
        info!("Logged in as {} ({})", me.name(), me.id);

        info!("Creating needed directories");
        self.layout
            .create_dirs(self.options.include_foreign_playlists)
            .await
            .map_err(|source| BackupError::Io {
                path: self.layout.root().clone(),
                source,
            })?;

        let mut summaries = Vec::new();

        info!("Loading liked songs...");
        let liked = self.collect("me/tracks", &[("limit", PAGE_LIMIT)], None).await?;
        summaries.push(self.save("Liked songs", RecordKind::Track, self.layout.liked_tracks(), &liked)?);

        info!("Loading playlists...");
        let playlists = self
            .collect(
                &format!("users/{}/playlists", me.id),
                &[("limit", PAGE_LIMIT)],
                None,
            )
            .await?;
        let (owned, foreign): (Vec<Value>, Vec<Value>) = playlists
            .into_iter()
            .partition(|p| p["owner"]["id"].as_str() == Some(me.id.as_str()));
        info!("Found {} user's playlists", owned.len());
        info!("Found {} foreign playlists", foreign.len());

        summaries.push(self.save("User playlists", RecordKind::Playlist, self.layout.playlists(true), &owned)?);
        summaries.push(self.save(
            "Foreign playlists",
            RecordKind::Playlist,
            self.layout.playlists(false),
            &foreign,
        )?);

        for playlist in &owned {
            if let Some(summary) = self.save_playlist_tracks(playlist, true).await? {
                summaries.push(summary);
            }
        }

        if self.options.include_foreign_playlists {
            for playlist in &foreign {
                if let Some(summary) = self.save_playlist_tracks(playlist, false).await? {
                    summaries.push(summary);
                }
            }
        }

        info!("Loading followed artists...");
        let artists = self
            .collect(
                "me/following",
                &[("type", "artist"), ("limit", PAGE_LIMIT)],
                Some("artists"),
            )
            .await?;
        info!("Found {} artists", artists.len());
        summaries.push(self.save("Followed artists", RecordKind::Artist, self.layout.artists(), &artists)?);

        info!("Loading saved albums...");
        let albums = self.collect("me/albums", &[("limit", PAGE_LIMIT)], None).await?;
        info!("Found {} albums", albums.len());
        summaries.push(self.save("Saved albums", RecordKind::Album, self.layout.albums(), &albums)?);

        info!("Loading saved podcast shows...");
        let shows = self.collect("me/shows", &[("limit", PAGE_LIMIT)], None).await?;
        info!("Found {} podcasts", shows.len());
        summaries.push(self.save("Podcast shows", RecordKind::Show, self.layout.shows(), &shows)?);

        info!("Loading saved podcast episodes...");
        let episodes = self.collect("me/episodes", &[("limit", PAGE_LIMIT)], None).await?;
        summaries.push(self.save("Podcast episodes", RecordKind::Episode, self.layout.episodes(), &episodes)?);

        success!("Backup of {} files written to {}", summaries.len(), self.layout.root().display());
        Ok(summaries)
    }

    async fn save_playlist_tracks(
        &self,
        playlist: &Value,
        owned: bool,
    ) -> Result<Option<ExportSummary>, BackupError> {
        let name = utils::playlist_display_name(playlist["name"].as_str().unwrap_or_default());
        let (Some(id), Some(href)) = (playlist["id"].as_str(), playlist["tracks"]["href"].as_str())
        else {
            warning!("Failed to load playlist {} (no tracks link)", name);
            return Ok(None);
        };

        let kind = if owned { "user" } else { "foreign" };
        match playlist["tracks"]["total"].as_u64() {
            Some(total) => info!("Loading {} playlist: {} ({} songs)", kind, name, total),
            None => info!("Loading {} playlist: {}", kind, name),
        }

        let tracks = self
            .collect(href, &[("limit", PLAYLIST_TRACKS_LIMIT)], None)
            .await?;
        info!("Saving {}'s songs", name);

        let summary = self.save(
            &format!("Playlist: {}", name),
            RecordKind::Track,
            self.layout.playlist_tracks(owned, name, id),
            &tracks,
        )?;
        Ok(Some(summary))
    }

    async fn collect(
        &self,
        resource: &str,
        query: &[(&str, &str)],
        nested: Option<&str>,
    ) -> Result<Vec<Value>, ApiError> {
        let pb = ProgressBar::new_spinner();
        pb.set_message("Loading first page...");
        pb.enable_steady_tick(Duration::from_millis(100));
        if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        let result = match nested {
            Some(field) => {
                self.client
                    .fetch_all_nested(resource, query, field, &pb)
                    .await
            }
            None => self.client.fetch_all(resource, query, &pb).await,
        };

        pb.finish_and_clear();
        result
    }

    fn save(
        &self,
        category: &str,
        kind: RecordKind,
        file: PathBuf,
        records: &[Value],
    ) -> Result<ExportSummary, BackupError> {
        let stats = write_csv(&file, kind, records).map_err(|source| BackupError::Csv {
            path: file.clone(),
            source,
        })?;

        Ok(ExportSummary {
            category: category.to_string(),
            file,
            stats,
        })
    }
}
