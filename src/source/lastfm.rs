//! Blocking Last.fm API client for the two fetch phases.

use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{RecentPlaysSource, Result, SourceError, TopArtistsSource};
use crate::models::PlayEvent;
use crate::normalize;

const API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

const USER_AGENT: &str = concat!("newfound/", env!("CARGO_PKG_VERSION"));

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "LASTFM_API_KEY";

/// Max page size Last.fm allows for user.getRecentTracks.
const RECENT_PAGE_SIZE: usize = 200;

/// Max page size Last.fm allows for user.getTopArtists.
const TOP_PAGE_SIZE: usize = 1000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Last.fm error body: `{"error": 6, "message": "User not found"}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: i64,
    message: String,
}

/// Last.fm returns a bare object instead of a one-element array when a
/// page has exactly one item.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

/// Numbers arrive as strings ("12"), occasionally as numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Count {
    Num(u64),
    Text(String),
}

impl Count {
    fn value(&self) -> Option<u64> {
        match self {
            Count::Num(n) => Some(*n),
            Count::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageAttr {
    #[serde(rename = "totalPages")]
    total_pages: Option<Count>,
}

impl PageAttr {
    fn total_pages(&self) -> u64 {
        self.total_pages.as_ref().and_then(Count::value).unwrap_or(1)
    }
}

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    recenttracks: RecentTracks,
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: OneOrMany<RecentTrack>,
    #[serde(rename = "@attr")]
    attr: Option<PageAttr>,
}

#[derive(Debug, Deserialize)]
struct RecentTrack {
    artist: TextField,
    name: String,
    date: Option<DateField>,
    #[serde(rename = "@attr")]
    attr: Option<TrackAttr>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct DateField {
    uts: Option<Count>,
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TrackAttr {
    nowplaying: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopArtistsResponse {
    topartists: TopArtists,
}

#[derive(Debug, Deserialize)]
struct TopArtists {
    #[serde(default)]
    artist: OneOrMany<TopArtist>,
    #[serde(rename = "@attr")]
    attr: Option<PageAttr>,
}

#[derive(Debug, Deserialize)]
struct TopArtist {
    name: String,
}

/// Read the API key using `lookup` (normally `std::env::var`).
pub fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    match lookup(API_KEY_VAR) {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(SourceError::CredentialsMissing(API_KEY_VAR)),
    }
}

pub struct LastFmClient {
    agent: ureq::Agent,
    api_key: String,
    timezone: Tz,
    rate_limit: Duration,
    last_request: Cell<Option<Instant>>,
}

impl LastFmClient {
    pub fn new(api_key: String, timezone: Tz, rate_limit_ms: u64) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            api_key,
            timezone,
            rate_limit: Duration::from_millis(rate_limit_ms),
            last_request: Cell::new(None),
        }
    }

    /// Build a client from `LASTFM_API_KEY`.
    pub fn from_env(timezone: Tz, rate_limit_ms: u64) -> Result<Self> {
        let api_key = api_key_from(|name| std::env::var(name).ok())?;
        Ok(Self::new(api_key, timezone, rate_limit_ms))
    }

    /// Sleep so consecutive requests are at least `rate_limit` apart.
    fn throttle(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.rate_limit {
                thread::sleep(self.rate_limit - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, String)]) -> Result<T> {
        self.throttle();

        let mut req = self
            .agent
            .get(API_BASE)
            .header("User-Agent", USER_AGENT)
            .query("method", method)
            .query("api_key", &self.api_key)
            .query("format", "json");
        for (k, v) in params {
            req = req.query(*k, v);
        }

        log::debug!("GET {method} {params:?}");
        let mut resp = req
            .call()
            .map_err(|e| SourceError::Http(format!("{method}: {e}")))?;
        let status = resp.status().as_u16();
        let body = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| SourceError::Http(format!("{method}: {e}")))?;

        parse_response(status, &body)
    }

    fn progress_bar(&self, label: &str) -> ProgressBar {
        let pb = ProgressBar::new(1);
        pb.set_style(
            ProgressStyle::with_template(
                "  [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} pages {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        pb.set_message(label.to_string());
        pb
    }
}

impl RecentPlaysSource for LastFmClient {
    fn recent_plays(
        &self,
        username: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PlayEvent>> {
        let pb = self.progress_bar("recent tracks");
        let mut plays = Vec::new();
        let mut page: u64 = 1;

        loop {
            let resp: RecentTracksResponse = self.call(
                "user.getrecenttracks",
                &[
                    ("user", username.to_string()),
                    ("from", from.timestamp().to_string()),
                    ("to", to.timestamp().to_string()),
                    ("limit", RECENT_PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ],
            )?;

            let total_pages = resp.recenttracks.attr.as_ref().map_or(1, PageAttr::total_pages).max(1);
            pb.set_length(total_pages);

            plays.extend(
                resp.recenttracks
                    .track
                    .into_vec()
                    .into_iter()
                    .filter_map(|t| play_event(t, self.timezone)),
            );
            pb.set_position(page);

            if page >= total_pages {
                break;
            }
            page += 1;
        }

        pb.finish_and_clear();
        log::info!("Fetched {} scrobbles over {} pages", plays.len(), page);
        Ok(plays)
    }
}

impl TopArtistsSource for LastFmClient {
    fn top_artists(&self, username: &str, limit: usize) -> Result<Vec<String>> {
        let per_page = limit.clamp(1, TOP_PAGE_SIZE);
        let pb = self.progress_bar("top artists");
        let mut names = Vec::with_capacity(limit);
        let mut page: u64 = 1;

        loop {
            let resp: TopArtistsResponse = self.call(
                "user.gettopartists",
                &[
                    ("user", username.to_string()),
                    ("period", "overall".to_string()),
                    ("limit", per_page.to_string()),
                    ("page", page.to_string()),
                ],
            )?;

            let total_pages = resp.topartists.attr.as_ref().map_or(1, PageAttr::total_pages).max(1);
            pb.set_length(total_pages);

            let batch = resp.topartists.artist.into_vec();
            let got = batch.len();
            names.extend(batch.into_iter().map(|a| a.name));
            pb.set_position(page);

            if got == 0 || names.len() >= limit || page >= total_pages {
                break;
            }
            page += 1;
        }

        pb.finish_and_clear();
        names.truncate(limit);
        log::info!("Fetched {} top artists", names.len());
        Ok(names)
    }
}

/// Turn an API row into a PlayEvent. Now-playing rows have no date and are skipped.
fn play_event(track: RecentTrack, tz: Tz) -> Option<PlayEvent> {
    let now_playing = track
        .attr
        .as_ref()
        .and_then(|a| a.nowplaying.as_deref())
        .is_some_and(|v| v == "true");
    if now_playing {
        return None;
    }
    let date = track.date?;

    let timestamp = date
        .uts
        .as_ref()
        .and_then(Count::value)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| normalize::format_unix_timestamp(secs, tz))
        .unwrap_or_else(|| normalize::localize_timestamp(&date.text, tz));

    Some(PlayEvent {
        artist: track.artist.text,
        track: track.name,
        timestamp,
    })
}

/// Decode a Last.fm response body, surfacing API error bodies first.
fn parse_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    if let Ok(err) = serde_json::from_str::<ApiError>(body) {
        return Err(SourceError::Api {
            code: err.error,
            message: err.message,
        });
    }
    if !(200..300).contains(&status) {
        return Err(SourceError::Http(format!("HTTP status {status}")));
    }
    serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))
}
