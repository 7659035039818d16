use crate::TRACK_NAME_FILTERS;
use crate::models::{LatestEventByArtist, LatestPlay, PlayEvent};
use crate::normalize;

/// Return true if the track name matches any entry in [`TRACK_NAME_FILTERS`].
pub fn should_skip_track(track: &str) -> bool {
    let lower = track.to_lowercase();
    TRACK_NAME_FILTERS.iter().any(|f| lower.contains(f))
}

/// Collapse a play stream into the most recent surviving play per artist.
///
/// `events` must be ordered newest-first, which is how Last.fm returns
/// recent tracks: the first occurrence of each artist key is kept and later
/// (older) ones are dropped. Filtered tracks never claim a slot, so an artist
/// whose only plays are filtered is absent from the result.
pub fn latest_by_artist(events: &[PlayEvent]) -> LatestEventByArtist {
    let mut latest = LatestEventByArtist::new();

    for event in events {
        if should_skip_track(&event.track) {
            log::trace!("Skipping filtered track {} - {}", event.artist, event.track);
            continue;
        }
        let key = normalize::canonicalize(&event.artist);
        latest.entry(key).or_insert_with(|| LatestPlay {
            artist: normalize::display_name(&event.artist),
            track: event.track.clone(),
            timestamp: event.timestamp.clone(),
        });
    }

    log::debug!("{} plays reduced to {} artists", events.len(), latest.len());
    latest
}
