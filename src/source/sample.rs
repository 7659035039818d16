use chrono::{DateTime, Utc};

use super::{RecentPlaysSource, Result, TopArtistsSource};
use crate::models::PlayEvent;

/// Canned scrobbles for dry runs, newest first per artist.
const SAMPLE_RECENT_TRACKS: &[(&str, &str, &str)] = &[
    // Single-scrobble artists (some known, some new)
    ("Khruangbin", "Maria También", "16 Feb 2026, 20:15"),
    ("Mdou Moctar", "Afrique Victime", "16 Feb 2026, 18:30"),
    ("Arooj Aftab", "Mohabbat", "15 Feb 2026, 22:00"),
    ("Nala Sinephro", "Space 1.8", "15 Feb 2026, 14:45"),
    ("BADBADNOTGOOD", "Time Moves Slow", "14 Feb 2026, 11:20"),
    ("Floating Points", "Silhouettes (I, II & III)", "14 Feb 2026, 09:00"),
    ("Little Simz", "Introvert", "13 Feb 2026, 16:30"),
    ("Beth Gibbons", "Floating on a Moment", "13 Feb 2026, 10:15"),
    ("Yussef Dayes", "Black Classical Music", "12 Feb 2026, 21:45"),
    ("Shabaka", "As the Planets and the Stars Collapse", "12 Feb 2026, 19:00"),
    ("Sault", "Free", "11 Feb 2026, 15:30"),
    ("Ezra Collective", "Victory Dance", "11 Feb 2026, 08:00"),
    // Repeat plays of top artists
    ("Radiohead", "Everything In Its Right Place", "16 Feb 2026, 10:00"),
    ("Radiohead", "Idioteque", "15 Feb 2026, 09:30"),
    ("Radiohead", "The National Anthem", "14 Feb 2026, 08:00"),
    ("Tame Impala", "Let It Happen", "16 Feb 2026, 12:00"),
    ("Tame Impala", "Elephant", "13 Feb 2026, 14:00"),
    // A new artist played several times
    ("Osees", "The Dream", "16 Feb 2026, 16:00"),
    ("Osees", "C", "16 Feb 2026, 15:45"),
];

/// Abbreviated stand-in for an all-time top-N list.
const SAMPLE_TOP_ARTISTS: &[&str] = &[
    "Radiohead",
    "Tame Impala",
    "Khruangbin",
    "BADBADNOTGOOD",
    "Floating Points",
    "Little Simz",
    "Sault",
    "Boards of Canada",
    "Aphex Twin",
    "Four Tet",
];

/// Offline source used by `--dry-run`. Never touches the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleSource;

impl RecentPlaysSource for SampleSource {
    fn recent_plays(
        &self,
        username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PlayEvent>> {
        println!("[DRY-RUN] Would fetch recent tracks for user: {username}");
        println!("[DRY-RUN] Period: {} to {}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d"));
        println!("[DRY-RUN] Returning {} sample tracks", SAMPLE_RECENT_TRACKS.len());
        Ok(SAMPLE_RECENT_TRACKS
            .iter()
            .map(|(artist, track, ts)| PlayEvent::new(artist, track, ts))
            .collect())
    }
}

impl TopArtistsSource for SampleSource {
    fn top_artists(&self, username: &str, limit: usize) -> Result<Vec<String>> {
        println!("[DRY-RUN] Would fetch top {limit} all-time artists for: {username}");
        println!("[DRY-RUN] Returning {} sample top artists", SAMPLE_TOP_ARTISTS.len());
        Ok(SAMPLE_TOP_ARTISTS
            .iter()
            .take(limit)
            .map(|s| s.to_string())
            .collect())
    }
}
