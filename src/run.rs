//! One update run: fetch recent → fetch reference → reconcile → persist.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, Utc};

use crate::acquire::{self, Acquirer, Freshness};
use crate::config::DataPaths;
use crate::dedup;
use crate::models::{Catalog, RunStats};
use crate::reconcile;
use crate::source::{RecentPlaysSource, TopArtistsSource};
use crate::store::{CatalogStore, ResumeStore};

/// Parameters of an update run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub username: String,
    pub lookback_days: i64,
    pub top_limit: usize,
    /// Use the sources as given but never read or write anything on disk
    /// except loading the catalog.
    pub dry_run: bool,
    /// Start from an empty resume cache even if one is on disk.
    pub ignore_cache: bool,
    pub freshness: Freshness,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The recent-plays phase came back empty; the catalog was not touched.
    NothingToAnalyze,
    Completed {
        stats: RunStats,
        catalog: Catalog,
        /// The reference set was empty, so every recent artist counted as a discovery.
        reference_empty: bool,
    },
}

/// Execute one run against the files in `paths`.
///
/// The catalog is written once, after a successful merge, and the resume
/// cache is deleted only after that write succeeds. Anything that fails
/// earlier leaves both files as they were.
pub fn run(
    opts: &RunOptions,
    paths: &DataPaths,
    recent_source: &dyn RecentPlaysSource,
    top_source: &dyn TopArtistsSource,
    now: DateTime<FixedOffset>,
) -> Result<RunOutcome> {
    if acquire::lookback_start(now.with_timezone(&Utc), opts.lookback_days).is_none() {
        bail!("Lookback of {} days is out of range", opts.lookback_days);
    }

    let catalog_store = CatalogStore::new(&paths.catalog);
    let resume_store = ResumeStore::new(&paths.state);

    let mut catalog = catalog_store.load().context("Failed to load catalog")?;
    println!(
        "Loaded existing catalog with {} artists.",
        catalog.metadata.total_discoveries
    );

    let mut acquirer = if opts.dry_run {
        Acquirer::offline(recent_source, top_source)
    } else {
        let cache = if opts.ignore_cache {
            log::info!("Ignoring cached state");
            Default::default()
        } else {
            resume_store.load()
        };
        if !cache.is_empty() {
            println!("Resuming with cached state (use --no-cache to ignore)");
        }
        Acquirer::live(recent_source, top_source, &resume_store, cache, opts.freshness)
    };

    println!("\nStep 1/3: Fetching recent tracks...");
    let plays = acquirer.recent_plays(&opts.username, opts.lookback_days, now);
    if plays.is_empty() {
        println!("\nNo recent tracks found. Nothing to analyze.");
        return Ok(RunOutcome::NothingToAnalyze);
    }

    println!("\nStep 2/3: Fetching all-time top artists...");
    let reference = acquirer.reference_set(&opts.username, opts.top_limit, now);
    let reference_empty = reference.is_empty();
    if reference_empty {
        log::warn!("Empty reference set; discoveries will be over-counted");
        println!(
            "\nWarning: No top artists returned. All recent artists \
             will be treated as 'new'."
        );
    }

    println!("\nStep 3/3: Updating discovery catalog...");
    let latest = dedup::latest_by_artist(&plays);
    let stats = reconcile::merge(&mut catalog, &latest, &reference, &opts.username, now);

    if opts.dry_run {
        println!("\n[DRY-RUN] Would save catalog to: {}", catalog_store.path().display());
    } else {
        catalog_store.save(&catalog).context("Failed to save catalog")?;
        println!("\nSaved updated catalog to: {}", catalog_store.path().display());
        if resume_store.clear().context("Failed to clear resume state")? {
            println!("State cleared (run complete).");
        }
    }

    Ok(RunOutcome::Completed {
        stats,
        catalog,
        reference_empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayEvent;
    use crate::normalize::canonicalize;
    use crate::source::{self, SampleSource, SourceError};
    use crate::store::resume::{CachedPhase, ResumeCache};
    use chrono::{Duration, TimeZone, Utc};
    use std::cell::Cell;
    use tempfile::TempDir;

    struct MockSource {
        plays: Vec<PlayEvent>,
        top: Option<Vec<String>>,
        recent_calls: Cell<usize>,
        top_calls: Cell<usize>,
    }

    impl MockSource {
        fn new(plays: &[(&str, &str, &str)], top: &[&str]) -> Self {
            Self {
                plays: plays.iter().map(|(a, t, ts)| PlayEvent::new(a, t, ts)).collect(),
                top: Some(top.iter().map(|s| s.to_string()).collect()),
                recent_calls: Cell::new(0),
                top_calls: Cell::new(0),
            }
        }

        /// Top-artist fetches fail.
        fn without_top(mut self) -> Self {
            self.top = None;
            self
        }
    }

    impl RecentPlaysSource for MockSource {
        fn recent_plays(
            &self,
            _username: &str,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> source::Result<Vec<PlayEvent>> {
            self.recent_calls.set(self.recent_calls.get() + 1);
            Ok(self.plays.clone())
        }
    }

    impl TopArtistsSource for MockSource {
        fn top_artists(&self, _username: &str, _limit: usize) -> source::Result<Vec<String>> {
            self.top_calls.set(self.top_calls.get() + 1);
            self.top
                .clone()
                .ok_or_else(|| SourceError::Http("timed out".into()))
        }
    }

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 17, 10, 0, 0)
            .unwrap()
    }

    fn opts() -> RunOptions {
        RunOptions {
            username: "listener".into(),
            lookback_days: 7,
            top_limit: 1000,
            dry_run: false,
            ignore_cache: false,
            freshness: Freshness::default(),
        }
    }

    #[test]
    fn test_live_run_saves_catalog_and_clears_state() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        let src = MockSource::new(
            &[("Osees", "The Dream", "16 Feb 2026, 08:00"), ("Radiohead", "Airbag", "15 Feb 2026, 08:00")],
            &["Radiohead"],
        );

        let outcome = run(&opts(), &paths, &src, &src, now()).unwrap();

        let RunOutcome::Completed { stats, reference_empty, .. } = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(stats.new_to_catalog, 1);
        assert_eq!(stats.matched_to_top, 1);
        assert!(!reference_empty);
        assert!(!paths.state.exists());

        let saved = CatalogStore::new(&paths.catalog).load().unwrap();
        assert!(saved.entries.contains_key(&canonicalize("osees")));
        assert_eq!(saved.metadata.total_discoveries, 1);
    }

    #[test]
    fn test_no_recent_plays_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        let src = MockSource::new(&[], &["Radiohead"]);

        let outcome = run(&opts(), &paths, &src, &src, now()).unwrap();

        assert!(matches!(outcome, RunOutcome::NothingToAnalyze));
        assert_eq!(src.top_calls.get(), 0);
        assert!(!paths.catalog.exists());
        assert!(!paths.state.exists());
    }

    #[test]
    fn test_empty_reference_set_still_merges() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        let src = MockSource::new(&[("Radiohead", "Airbag", "15 Feb 2026, 08:00")], &[]).without_top();

        let outcome = run(&opts(), &paths, &src, &src, now()).unwrap();

        let RunOutcome::Completed { stats, reference_empty, .. } = outcome else {
            panic!("expected a completed run");
        };
        assert!(reference_empty);
        assert_eq!(stats.new_to_catalog, 1);
        assert!(paths.catalog.exists());
    }

    #[test]
    fn test_resumes_from_cached_recent_tracks() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        ResumeStore::new(&paths.state)
            .save(&ResumeCache {
                recent_tracks: Some(CachedPhase {
                    fetched_at: now() - Duration::hours(2),
                    data: vec![PlayEvent::new("Shabaka", "Insecurities", "14 Feb 2026, 09:00")],
                }),
                top_artists: None,
            })
            .unwrap();
        let src = MockSource::new(&[("Someone Else", "Track", "17 Feb 2026, 09:00")], &["Radiohead"]);

        run(&opts(), &paths, &src, &src, now()).unwrap();

        assert_eq!(src.recent_calls.get(), 0);
        assert_eq!(src.top_calls.get(), 1);
        let saved = CatalogStore::new(&paths.catalog).load().unwrap();
        assert!(saved.entries.contains_key(&canonicalize("shabaka")));
        assert!(!saved.entries.contains_key(&canonicalize("someone else")));
    }

    #[test]
    fn test_ignore_cache_refetches() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        ResumeStore::new(&paths.state)
            .save(&ResumeCache {
                recent_tracks: Some(CachedPhase {
                    fetched_at: now() - Duration::hours(2),
                    data: vec![PlayEvent::new("Shabaka", "Insecurities", "14 Feb 2026, 09:00")],
                }),
                top_artists: None,
            })
            .unwrap();
        let src = MockSource::new(&[("Osees", "C", "17 Feb 2026, 09:00")], &["Radiohead"]);

        let run_opts = RunOptions { ignore_cache: true, ..opts() };
        run(&run_opts, &paths, &src, &src, now()).unwrap();

        assert_eq!(src.recent_calls.get(), 1);
        let saved = CatalogStore::new(&paths.catalog).load().unwrap();
        assert!(saved.entries.contains_key(&canonicalize("osees")));
        assert!(!saved.entries.contains_key(&canonicalize("shabaka")));
    }

    #[test]
    fn test_corrupt_catalog_aborts_before_fetching() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        std::fs::write(&paths.catalog, "not json").unwrap();
        let src = MockSource::new(&[("Osees", "C", "t")], &[]);

        assert!(run(&opts(), &paths, &src, &src, now()).is_err());
        assert_eq!(src.recent_calls.get(), 0);
        assert_eq!(std::fs::read_to_string(&paths.catalog).unwrap(), "not json");
    }

    #[test]
    fn test_dry_run_touches_no_files() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        let run_opts = RunOptions { dry_run: true, ..opts() };

        let outcome = run(&run_opts, &paths, &SampleSource, &SampleSource, now()).unwrap();

        let RunOutcome::Completed { stats, catalog, .. } = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(stats.unique_artists_this_week, 15);
        assert_eq!(stats.matched_to_top, 7);
        assert_eq!(stats.new_to_catalog, 8);
        assert_eq!(catalog.metadata.total_discoveries, 8);
        assert!(!paths.catalog.exists());
        assert!(!paths.state.exists());
    }

    #[test]
    fn test_second_week_updates_and_graduates() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());

        let week1 = MockSource::new(
            &[("Osees", "The Dream", "09 Feb 2026, 08:00"), ("Sault", "Free", "08 Feb 2026, 08:00")],
            &["Radiohead"],
        );
        run(&opts(), &paths, &week1, &week1, now() - Duration::days(7)).unwrap();

        let week2 = MockSource::new(
            &[("Osees", "C", "16 Feb 2026, 08:00")],
            &["Radiohead", "Sault"],
        );
        let outcome = run(&opts(), &paths, &week2, &week2, now()).unwrap();
        let RunOutcome::Completed { stats, catalog, .. } = outcome else {
            panic!("expected a completed run");
        };

        assert_eq!(stats.updated_in_catalog, 1);
        assert_eq!(stats.graduated_to_top, 1);
        let osees = &catalog.entries[&canonicalize("osees")];
        assert_eq!(osees.first_discovered, "09 Feb 2026, 08:00");
        assert_eq!(osees.last_listened, "16 Feb 2026, 08:00");
        assert!(catalog.entries[&canonicalize("sault")].graduated);
        assert_eq!(catalog.metadata.total_graduated, 1);
    }

    #[test]
    fn test_out_of_range_lookback_is_an_error() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::in_dir(dir.path());
        let src = MockSource::new(&[("Osees", "C", "17 Feb 2026, 09:00")], &["Radiohead"]);

        for days in [0, 200_000_000] {
            let run_opts = RunOptions { lookback_days: days, ..opts() };
            assert!(run(&run_opts, &paths, &src, &src, now()).is_err());
        }
        assert_eq!(src.recent_calls.get(), 0);
        assert!(!paths.catalog.exists());
    }
}
