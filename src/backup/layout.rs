use std::{io, path::PathBuf};

use chrono::NaiveDate;

use crate::utils;

/// File and directory names of a backup.
///
/// ```text
/// <root>/Music/Liked.csv
/// <root>/Music/Artists.csv
/// <root>/Music/Albums.csv
/// <root>/Music/Playlists/UserPlaylists.csv
/// <root>/Music/Playlists/ForeignPlaylists.csv
/// <root>/Music/Playlists/User/<name> - <id>.csv
/// <root>/Music/Playlists/Foreign/<name> - <id>.csv
/// <root>/Podcasts/Shows.csv
/// <root>/Podcasts/Episodes.csv
/// ```
#[derive(Debug, Clone)]
pub struct BackupLayout {
    root: PathBuf,
}

impl BackupLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Places the backup in a `backup-YYYY-MM-DD` directory below `root`.
    pub fn dated(root: impl Into<PathBuf>, date: NaiveDate) -> Self {
        Self::new(root.into().join(utils::dated_dir_name(date)))
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn music_dir(&self) -> PathBuf {
        self.root.join("Music")
    }

    pub fn playlists_dir(&self) -> PathBuf {
        self.music_dir().join("Playlists")
    }

    pub fn podcasts_dir(&self) -> PathBuf {
        self.root.join("Podcasts")
    }

    pub fn playlist_tracks_dir(&self, owned: bool) -> PathBuf {
        self.playlists_dir()
            .join(if owned { "User" } else { "Foreign" })
    }

    pub fn liked_tracks(&self) -> PathBuf {
        self.music_dir().join("Liked.csv")
    }

    pub fn artists(&self) -> PathBuf {
        self.music_dir().join("Artists.csv")
    }

    pub fn albums(&self) -> PathBuf {
        self.music_dir().join("Albums.csv")
    }

    pub fn playlists(&self, owned: bool) -> PathBuf {
        self.playlists_dir().join(if owned {
            "UserPlaylists.csv"
        } else {
            "ForeignPlaylists.csv"
        })
    }

    pub fn playlist_tracks(&self, owned: bool, name: &str, id: &str) -> PathBuf {
        let name = utils::sanitize_file_name(utils::playlist_display_name(name));
        let id = utils::sanitize_file_name(id);
        self.playlist_tracks_dir(owned)
            .join(format!("{} - {}.csv", name, id))
    }

    pub fn shows(&self) -> PathBuf {
        self.podcasts_dir().join("Shows.csv")
    }

    pub fn episodes(&self) -> PathBuf {
        self.podcasts_dir().join("Episodes.csv")
    }

    pub async fn create_dirs(&self, include_foreign: bool) -> io::Result<()> {
        async_fs::create_dir_all(self.playlist_tracks_dir(true)).await?;
        if include_foreign {
            async_fs::create_dir_all(self.playlist_tracks_dir(false)).await?;
        }
        async_fs::create_dir_all(self.podcasts_dir()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_files_are_named_after_name_and_id() {
        let layout = BackupLayout::new("done");
        assert_eq!(
            layout.playlist_tracks(true, "Road / Trip", "37i9"),
            PathBuf::from("done/Music/Playlists/User/Road _ Trip - 37i9.csv")
        );
        assert_eq!(
            layout.playlist_tracks(false, "", "abc"),
            PathBuf::from("done/Music/Playlists/Foreign/unnamed - abc.csv")
        );
    }

    #[test]
    fn dated_layout_nests_below_root() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let layout = BackupLayout::dated("out", date);
        assert_eq!(layout.root(), &PathBuf::from("out/backup-2024-03-09"));
        assert_eq!(
            layout.episodes(),
            PathBuf::from("out/backup-2024-03-09/Podcasts/Episodes.csv")
        );
    }
}
