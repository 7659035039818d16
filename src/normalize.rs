//! Artist identity and timestamp normalization.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::ArtistKey;

/// Quote characters stripped from both ends of artist names (straight and curly).
const QUOTE_CHARS: &[char] = &['\'', '"', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];

/// Timestamp format used by Last.fm (`"16 Feb 2026, 20:15"`), kept for display.
pub const DISPLAY_FORMAT: &str = "%d %b %Y, %H:%M";

/// Strip leading/trailing quotation marks, preserving case.
pub fn display_name(raw: &str) -> String {
    raw.trim_matches(QUOTE_CHARS).to_string()
}

/// Canonical identity for an artist name. Pure and total.
pub fn canonicalize(raw: &str) -> ArtistKey {
    ArtistKey::from_canonical(raw.trim_matches(QUOTE_CHARS).to_lowercase())
}

/// Convert a UTC timestamp string from the API into `tz`.
/// Empty or unparseable input is passed through unchanged.
pub fn localize_timestamp(raw: &str, tz: Tz) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match NaiveDateTime::parse_from_str(raw.trim(), DISPLAY_FORMAT) {
        Ok(naive) => Utc
            .from_utc_datetime(&naive)
            .with_timezone(&tz)
            .format(DISPLAY_FORMAT)
            .to_string(),
        Err(e) => {
            log::debug!("Keeping unparseable timestamp {raw:?}: {e}");
            raw.to_string()
        }
    }
}

/// Parse a stored display timestamp for ordering. `None` if it isn't in
/// [`DISPLAY_FORMAT`] (e.g. a passed-through raw value).
pub fn parse_display_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), DISPLAY_FORMAT).ok()
}

/// Render a unix timestamp (seconds) in `tz` using the display format.
pub fn format_unix_timestamp(secs: i64, tz: Tz) -> Option<String> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.with_timezone(&tz).format(DISPLAY_FORMAT).to_string())
}

/// Last.fm library page for an artist in a user's listening history.
pub fn library_url(username: &str, artist: &str) -> String {
    format!(
        "https://www.last.fm/user/{username}/library/music/{}",
        urlencoding::encode(artist)
    )
}

/// Last.fm page for a track.
pub fn track_url(artist: &str, track: &str) -> String {
    format!(
        "https://www.last.fm/music/{}/_/{}",
        urlencoding::encode(artist),
        urlencoding::encode(track)
    )
}
