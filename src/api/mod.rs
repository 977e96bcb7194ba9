//! # API Module
//!
//! HTTP handlers served by the local callback listener (see [`crate::server`]).
//!
//! ## Endpoints
//!
//! ### Implicit grant
//!
//! - [`redirect`] - Target of Spotify's redirect. Answers with [`BRIDGE_PAGE`],
//!   a script that moves the token from the URL fragment into the query string
//!   of a `/token` request.
//! - [`token`] - Captures `access_token` (or `error`) from the query string.
//!
//! ### Authorization code grant
//!
//! - [`callback`] - Captures `code` (or `error`) from the query string.
//!
//! Requests for any other path are answered with `404 Not Found`.

mod callback;

pub use callback::{BRIDGE_PAGE, CLOSE_PAGE, callback, redirect, token};
