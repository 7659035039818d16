use chrono::{DateTime, FixedOffset};

use crate::models::{Catalog, CatalogEntry, LatestEventByArtist, ReferenceSet, RunStats};
use crate::normalize;

/// Merge this window's plays into the catalog, mutating it in place.
///
/// Graduations are stamped first, then each recent artist is classified as
/// exactly one of: in the top set, already cataloged (updated), or new
/// (inserted). Entries are never removed and `first_discovered` is never
/// rewritten, so merging the same input twice only repeats the updates.
pub fn merge(
    catalog: &mut Catalog,
    latest: &LatestEventByArtist,
    reference: &ReferenceSet,
    username: &str,
    now: DateTime<FixedOffset>,
) -> RunStats {
    let mut stats = RunStats {
        unique_artists_this_week: latest.len(),
        ..Default::default()
    };

    // 1. Graduations: catalog artists that have since reached the top set
    for (key, entry) in catalog.entries.iter_mut() {
        if !entry.graduated && reference.contains(key) {
            entry.graduated = true;
            entry.graduated_date = Some(now);
            stats.graduated_to_top += 1;
            log::info!("{} graduated to the top artists", entry.artist);
        }
    }

    // 2. Classification
    for (key, play) in latest {
        if reference.contains(key) {
            stats.matched_to_top += 1;
            continue;
        }

        match catalog.entries.get_mut(key) {
            Some(entry) => {
                entry.last_listened = play.timestamp.clone();
                entry.track = play.track.clone();
                entry.track_url = normalize::track_url(&play.artist, &play.track);
                stats.updated_in_catalog += 1;
            }
            None => {
                log::debug!("New discovery: {}", play.artist);
                catalog.entries.insert(
                    key.clone(),
                    CatalogEntry {
                        artist: play.artist.clone(),
                        first_discovered: play.timestamp.clone(),
                        last_listened: play.timestamp.clone(),
                        track: play.track.clone(),
                        artist_url: normalize::library_url(username, &play.artist),
                        track_url: normalize::track_url(&play.artist, &play.track),
                        graduated: false,
                        graduated_date: None,
                    },
                );
                stats.new_to_catalog += 1;
            }
        }
        stats.touched.push(key.clone());
    }

    // 3. Metadata
    catalog.metadata.last_updated = Some(now);
    catalog.metadata.username = username.to_string();
    catalog.metadata.total_discoveries = catalog.entries.len();
    catalog.metadata.total_graduated = catalog.graduated_count();

    stats
}
