//! # CLI Module
//!
//! User-facing commands. Each command loads the [`crate::config::Config`],
//! calls into the library and reports the result with the crate's logging
//! macros. Fatal errors end the process with exit status 1.
//!
//! ## Commands
//!
//! - [`backup`] - Export the library to CSV files. Uses the stored refresh
//!   token when configured, otherwise the browser login.
//! - [`auth`] - One-time browser login that prints a refresh token for
//!   unattended backups.
//!
//! ## Usage Patterns
//!
//! ```bash
//! spotify-backup auth                          # obtain a refresh token once
//! spotify-backup backup                        # export to ./done
//! spotify-backup backup --foreign-playlists    # include followed playlists' tracks
//! spotify-backup backup --output /srv/backup --dated
//! ```

mod auth;
mod backup;

pub use auth::auth;
pub use backup::backup;
