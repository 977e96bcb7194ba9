use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::NaiveDate;
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_code_verifier() -> String {
    random_string(128)
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque value echoed back by the authorization server to tie a redirect
/// to the request that started it.
pub fn generate_state() -> String {
    random_string(16)
}

/// Formats a duration in milliseconds as `Xm Ys`, `Xh Ym Zs` or `Xd Xh Ym Zs`.
///
/// Up to and including one hour the minutes are not folded into hours, so
/// `3_600_000` becomes `60m 0s`.
pub fn format_duration_ms(duration_ms: u64) -> String {
    let total = duration_ms / 1000;
    let days = total / 86_400;
    let seconds = total % 86_400;
    let (hours, minutes, secs) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, secs)
    } else if seconds <= 3600 {
        format!("{}m {}s", seconds / 60, secs)
    } else {
        format!("{}h {}m {}s", hours, minutes, secs)
    }
}

/// Name used for a playlist's file; Spotify allows empty playlist names.
pub fn playlist_display_name(name: &str) -> &str {
    if name.trim().is_empty() {
        "unnamed"
    } else {
        name
    }
}

/// Makes a user-provided name safe to use as a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn dated_dir_name(date: NaiveDate) -> String {
    format!("backup-{}", date.format("%Y-%m-%d"))
}
