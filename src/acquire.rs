//! Cached, resumable acquisition of the two expensive inputs of a run.
//!
//! Each phase (recent plays, top artists) is served from the resume cache
//! while it is fresh. Otherwise it is fetched from its source and, in live
//! runs, written back to the resume store straight away, so a run that dies
//! in a later phase can pick up from here. Source failures never escape this
//! module: they are logged and become empty results.

use chrono::{DateTime, Duration, FixedOffset, Utc};

use crate::models::{PlayEvent, ReferenceSet};
use crate::source::{RecentPlaysSource, TopArtistsSource};
use crate::store::resume::{CachedPhase, ResumeCache, ResumeStore};

/// How long each cached phase stays usable.
#[derive(Debug, Clone, Copy)]
pub struct Freshness {
    pub recent: Duration,
    pub top: Duration,
}

impl Default for Freshness {
    fn default() -> Self {
        Self {
            recent: Duration::hours(6),
            top: Duration::hours(24),
        }
    }
}

impl Freshness {
    /// `None` if either window doesn't fit in a `Duration`.
    pub fn from_hours(recent_hours: i64, top_hours: i64) -> Option<Self> {
        Some(Self {
            recent: Duration::try_hours(recent_hours)?,
            top: Duration::try_hours(top_hours)?,
        })
    }
}

/// Start of a `days`-long window ending at `to`.
/// `None` unless `days` is positive and the start is a representable date.
pub fn lookback_start(to: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    if days < 1 {
        return None;
    }
    Duration::try_days(days).and_then(|d| to.checked_sub_signed(d))
}

pub struct Acquirer<'a> {
    recent_source: &'a dyn RecentPlaysSource,
    top_source: &'a dyn TopArtistsSource,
    /// `None` for dry runs: nothing is read from or written to disk.
    store: Option<&'a ResumeStore>,
    cache: ResumeCache,
    freshness: Freshness,
}

impl<'a> Acquirer<'a> {
    /// Live acquisition backed by `store`, starting from an already loaded `cache`
    /// (pass an empty cache to force re-fetching).
    pub fn live(
        recent_source: &'a dyn RecentPlaysSource,
        top_source: &'a dyn TopArtistsSource,
        store: &'a ResumeStore,
        cache: ResumeCache,
        freshness: Freshness,
    ) -> Self {
        Self {
            recent_source,
            top_source,
            store: Some(store),
            cache,
            freshness,
        }
    }

    /// Dry-run acquisition: always asks the sources, never caches.
    pub fn offline(
        recent_source: &'a dyn RecentPlaysSource,
        top_source: &'a dyn TopArtistsSource,
    ) -> Self {
        Self {
            recent_source,
            top_source,
            store: None,
            cache: ResumeCache::default(),
            freshness: Freshness::default(),
        }
    }

    /// Current in-memory view of the resume cache.
    pub fn cache(&self) -> &ResumeCache {
        &self.cache
    }

    /// Plays in the last `lookback_days` before `now`, newest first.
    /// Empty if the source failed.
    pub fn recent_plays(
        &mut self,
        username: &str,
        lookback_days: i64,
        now: DateTime<FixedOffset>,
    ) -> Vec<PlayEvent> {
        if let Some(cached) = &self.cache.recent_tracks {
            if cached.age(now) < self.freshness.recent {
                println!(
                    "Using cached recent tracks (fetched {:.1}h ago)",
                    cached.age_hours(now)
                );
                return cached.data.clone();
            }
            println!("Cached recent tracks are stale, re-fetching...");
            self.cache.recent_tracks = None;
        }

        let to = now.with_timezone(&Utc);
        let Some(from) = lookback_start(to, lookback_days) else {
            log::warn!("Lookback of {lookback_days} days is out of range");
            return Vec::new();
        };
        println!("Fetching recent tracks for user: {username}");
        println!("Period: Last {lookback_days} days");

        let plays = match self.recent_source.recent_plays(username, from, to) {
            Ok(plays) => plays,
            Err(e) => {
                log::warn!("Recent tracks unavailable: {e}");
                return Vec::new();
            }
        };
        println!("Fetched {} scrobbles from the last {lookback_days} days", plays.len());

        if !plays.is_empty() && self.cache.recent_tracks.is_none() {
            if let Some(store) = self.store {
                self.cache.recent_tracks = Some(CachedPhase {
                    fetched_at: now,
                    data: plays.clone(),
                });
                self.persist(store, "recent tracks");
            }
        }
        plays
    }

    /// The all-time top `limit` artists. Empty if the source failed.
    pub fn reference_set(
        &mut self,
        username: &str,
        limit: usize,
        now: DateTime<FixedOffset>,
    ) -> ReferenceSet {
        if let Some(cached) = &self.cache.top_artists {
            if cached.age(now) < self.freshness.top {
                println!(
                    "Using cached top artists (fetched {:.1}h ago)",
                    cached.age_hours(now)
                );
                return ReferenceSet::from_names(&cached.data);
            }
            println!("Cached top artists are stale, re-fetching...");
            self.cache.top_artists = None;
        }

        println!("Fetching top {limit} all-time artists for: {username}");
        let names = match self.top_source.top_artists(username, limit) {
            Ok(names) => names,
            Err(e) => {
                log::warn!("Top artists unavailable: {e}");
                return ReferenceSet::default();
            }
        };
        let reference = ReferenceSet::from_names(&names);
        println!("Fetched {} top artists", reference.len());

        // An empty set is never cached: it would pin a degraded run for a day.
        if !reference.is_empty() && self.cache.top_artists.is_none() {
            if let Some(store) = self.store {
                self.cache.top_artists = Some(CachedPhase {
                    fetched_at: now,
                    data: reference.sorted_keys(),
                });
                self.persist(store, "top artists");
            }
        }
        reference
    }

    fn persist(&self, store: &ResumeStore, what: &str) {
        match store.save(&self.cache) {
            Ok(()) => println!("  (Cached {what} to {})", store.path().display()),
            Err(e) => log::warn!("Failed to cache {what}: {e}"),
        }
    }
}
