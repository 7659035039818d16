use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use newfound::acquire::Freshness;
use newfound::config::{AppConfig, DataPaths};
use newfound::models::{Catalog, CatalogEntry, RunStats};
use newfound::run::{RunOptions, RunOutcome};
use newfound::source::{LastFmClient, SampleSource};
use newfound::store::{CatalogStore, ResumeStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "newfound",
    version,
    about = "Catalog artists heard this week that aren't in your all-time top artists"
)]
struct Cli {
    /// Directory holding the catalog and resume state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch this week's scrobbles and merge new discoveries into the catalog
    Update {
        /// Run with sample data (no API calls, nothing written)
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Last.fm username (defaults to config file username)
        #[arg(short, long)]
        username: Option<String>,

        /// Number of days to look back
        #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..))]
        days: Option<i64>,

        /// Number of all-time top artists to compare against
        #[arg(short, long)]
        top_limit: Option<usize>,

        /// Ignore cached API results and re-fetch everything
        #[arg(long)]
        no_cache: bool,
    },

    /// List cataloged discoveries, most recently played first
    List {
        /// Only show artists that have graduated into the top artists
        #[arg(long)]
        graduated: bool,

        /// Number of results
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Delete the resume cache left by an interrupted run
    ClearCache,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    // Resolve data dir: CLI > config > XDG default
    let data_dir = cli
        .data_dir
        .or(config.data_dir.clone())
        .unwrap_or_else(newfound::config::default_data_dir);
    log::info!("Data directory: {}", data_dir.display());
    let paths = DataPaths::in_dir(&data_dir);

    match cli.command {
        Commands::Update { dry_run, username, days, top_limit, no_cache } => {
            let username = username.or(config.username.clone()).context(
                "No username. Pass --username or set username in the config file.",
            )?;
            let tz = config.resolve_timezone();
            let opts = RunOptions {
                username,
                lookback_days: days.unwrap_or(config.lookback_days),
                top_limit: top_limit.unwrap_or(config.top_limit),
                dry_run,
                ignore_cache: no_cache,
                freshness: Freshness::from_hours(
                    config.cache.recent_ttl_hours,
                    config.cache.top_ttl_hours,
                )
                .context("Cache TTL hours in the config file are out of range")?,
            };

            print_banner(&opts, &paths);

            let now = Utc::now().with_timezone(&tz).fixed_offset();
            let outcome = if dry_run {
                newfound::run::run(&opts, &paths, &SampleSource, &SampleSource, now)?
            } else {
                // Credentials are checked before any fetch
                let client = LastFmClient::from_env(tz, config.lastfm.rate_limit_ms)
                    .context("Cannot reach Last.fm")?;
                newfound::run::run(&opts, &paths, &client, &client, now)?
            };

            if let RunOutcome::Completed { stats, catalog, .. } = outcome {
                print_results(&stats, &catalog, opts.lookback_days, opts.top_limit);
            }
            println!("\nDone!");
        }

        Commands::List { graduated, limit } => {
            let catalog = CatalogStore::new(&paths.catalog)
                .load()
                .context("Failed to load catalog")?;
            if catalog.entries.is_empty() {
                println!("Catalog is empty. Run `newfound update` first.");
                return Ok(());
            }

            let mut entries: Vec<&CatalogEntry> = catalog
                .entries
                .values()
                .filter(|e| !graduated || e.graduated)
                .collect();
            entries.sort_by(|a, b| {
                newfound::normalize::parse_display_timestamp(&b.last_listened)
                    .cmp(&newfound::normalize::parse_display_timestamp(&a.last_listened))
            });
            entries.truncate(limit);

            if entries.is_empty() {
                println!("{}", empty_list_message(graduated));
                return Ok(());
            }

            println!(
                "{} of {} discoveries ({} graduated), user {}",
                entries.len(),
                catalog.metadata.total_discoveries,
                catalog.metadata.total_graduated,
                catalog.metadata.username
            );
            println!();
            print_entry_table(&entries);
        }

        Commands::ClearCache => {
            let store = ResumeStore::new(&paths.state);
            if store.clear().context("Failed to delete resume state")? {
                println!("Removed {}", store.path().display());
            } else {
                println!("No cached state at {}", store.path().display());
            }
        }
    }

    Ok(())
}

fn print_banner(opts: &RunOptions, paths: &DataPaths) {
    println!("{}", "=".repeat(72));
    println!("  New Artist Discovery Cataloger");
    println!("{}", "=".repeat(72));
    println!("  Username:       {}", opts.username);
    println!("  Lookback:       {} days", opts.lookback_days);
    println!("  Top artists:    {}", opts.top_limit);
    println!("  Catalog:        {}", paths.catalog.display());
    println!("  Mode:           {}", if opts.dry_run { "DRY-RUN" } else { "LIVE" });
    println!("{}", "=".repeat(72));
    println!();
}

/// Print run counters and the entries this run touched.
fn print_results(stats: &RunStats, catalog: &Catalog, days: i64, top_limit: usize) {
    println!();
    println!("{}", "=".repeat(72));
    println!("  New Artist Discoveries (Last {} Days)", days);
    println!("{}", "=".repeat(72));
    println!();
    println!("  Unique artists heard this week: {:>5}", stats.unique_artists_this_week);
    println!("  Already in all-time Top {:<6}  {:>5}", format!("{top_limit}:"), stats.matched_to_top);
    println!("  Brand new discoveries added:    {:>5}", stats.new_to_catalog);
    println!("  Existing discoveries updated:   {:>5}", stats.updated_in_catalog);
    if stats.graduated_to_top > 0 {
        println!("  Graduated to Top {:<13}  {:>5}", format!("{top_limit}:"), stats.graduated_to_top);
    }
    println!();

    if stats.touched.is_empty() {
        println!("  No new or existing discoveries were played this week.");
        println!("{}", "=".repeat(72));
        return;
    }

    let mut entries: Vec<&CatalogEntry> = stats
        .touched
        .iter()
        .filter_map(|key| catalog.entries.get(key))
        .collect();
    entries.sort_by(|a, b| {
        newfound::normalize::parse_display_timestamp(&b.last_listened)
            .cmp(&newfound::normalize::parse_display_timestamp(&a.last_listened))
    });

    let artist_w = entries.iter().map(|e| e.artist.chars().count()).max().unwrap_or(0).clamp(6, 30);
    let track_w = entries.iter().map(|e| e.track.chars().count()).max().unwrap_or(0).clamp(5, 35);

    println!("  {:<artist_w$}  {:<track_w$}  Status", "Artist", "Latest Track");
    let sep = format!("  {}  {}  {}", "-".repeat(artist_w), "-".repeat(track_w), "-".repeat(16));
    println!("{sep}");

    for e in &entries {
        let status = if e.first_discovered == e.last_listened { "NEW!" } else { "Updated" };
        println!(
            "  {:<artist_w$}  {:<track_w$}  {}",
            truncate(&e.artist, artist_w),
            truncate(&e.track, track_w),
            status
        );
    }

    println!("{sep}");
    println!("  Total catalog size: {} artists", catalog.metadata.total_discoveries);
    println!("{}", "=".repeat(72));
}

/// Print catalog entries for `list`.
fn print_entry_table(entries: &[&CatalogEntry]) {
    println!(
        "{:<30} {:<30} {:>18} {:>18}  {}",
        "Artist", "Latest Track", "First Heard", "Last Heard", "Grad"
    );
    println!("{}", "-".repeat(106));

    for e in entries {
        println!(
            "{:<30} {:<30} {:>18} {:>18}  {}",
            truncate(&e.artist, 30),
            truncate(&e.track, 30),
            e.first_discovered,
            e.last_listened,
            if e.graduated { "yes" } else { "" }
        );
    }
}

fn empty_list_message(graduated: bool) -> &'static str {
    if graduated {
        "No graduated artists yet."
    } else {
        "No discoveries to show."
    }
}

/// Shorten to `width` characters, ending with an ellipsis if cut.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('\u{2026}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_message_follows_filter() {
        assert_eq!(empty_list_message(true), "No graduated artists yet.");
        assert_eq!(empty_list_message(false), "No discoveries to show.");
    }

    #[test]
    fn test_days_must_be_positive() {
        assert!(Cli::try_parse_from(["newfound", "update", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["newfound", "update", "--days", "-2"]).is_err());
        let cli = Cli::try_parse_from(["newfound", "update", "--days", "14"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { days: Some(14), .. }));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Osees", 10), "Osees");
        assert_eq!(truncate("Black Country, New Road", 8), "Black C\u{2026}");
    }
}
