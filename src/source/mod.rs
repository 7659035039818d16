pub mod lastfm;
pub mod sample;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::PlayEvent;

pub use lastfm::LastFmClient;
pub use sample::SampleSource;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Missing credentials: set {0} in the environment")]
    CredentialsMissing(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Last.fm API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("Unexpected response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Where recent plays come from.
pub trait RecentPlaysSource {
    /// Plays between `from` and `to`, newest first.
    fn recent_plays(
        &self,
        username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PlayEvent>>;
}

/// Where the all-time top artists come from.
pub trait TopArtistsSource {
    /// Up to `limit` artist names, most played first.
    fn top_artists(&self, username: &str, limit: usize) -> Result<Vec<String>>;
}
