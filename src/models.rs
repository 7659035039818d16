use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::normalize;

/// A single scrobble as returned by the recent-plays source.
///
/// `timestamp` is already localized to the display timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub artist: String,
    pub track: String,
    pub timestamp: String,
}

impl PlayEvent {
    pub fn new(artist: &str, track: &str, timestamp: &str) -> Self {
        Self {
            artist: artist.to_string(),
            track: track.to_string(),
            timestamp: timestamp.to_string(),
        }
    }
}

/// Canonical artist identity: quote-stripped and case-folded.
///
/// Only built through [`normalize::canonicalize`], so two keys compare equal
/// exactly when they name the same artist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtistKey(String);

impl ArtistKey {
    pub(crate) fn from_canonical(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtistKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The representative (most recent) play for one artist in the fetch window.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestPlay {
    /// Display name: quotes stripped, case preserved.
    pub artist: String,
    pub track: String,
    pub timestamp: String,
}

/// One entry per artist key, ordered by key.
pub type LatestEventByArtist = BTreeMap<ArtistKey, LatestPlay>;

/// Snapshot of the listener's all-time top-N artists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSet {
    keys: HashSet<ArtistKey>,
}

impl ReferenceSet {
    /// Build from raw artist names (or previously cached keys); each is canonicalized.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: names
                .into_iter()
                .map(|n| normalize::canonicalize(n.as_ref()))
                .collect(),
        }
    }

    pub fn contains(&self, key: &ArtistKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in sorted order (stable for the resume cache file).
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.keys.iter().map(|k| k.as_str().to_string()).collect();
        keys.sort();
        keys
    }
}

/// A persisted discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub artist: String,
    /// Set on insert, never changed afterwards.
    pub first_discovered: String,
    pub last_listened: String,
    pub track: String,
    pub artist_url: String,
    pub track_url: String,
    #[serde(default)]
    pub graduated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduated_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogMetadata {
    pub last_updated: Option<DateTime<FixedOffset>>,
    pub username: String,
    pub total_discoveries: usize,
    pub total_graduated: usize,
}

/// The whole discovery catalog, as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub metadata: CatalogMetadata,
    #[serde(default, rename = "catalog")]
    pub entries: BTreeMap<ArtistKey, CatalogEntry>,
}

impl Catalog {
    pub fn graduated_count(&self) -> usize {
        self.entries.values().filter(|e| e.graduated).count()
    }
}

/// Counters from a single merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub unique_artists_this_week: usize,
    pub matched_to_top: usize,
    pub new_to_catalog: usize,
    pub updated_in_catalog: usize,
    pub graduated_to_top: usize,
    /// Keys inserted or updated during this merge, in classification order.
    pub touched: Vec<ArtistKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_set_canonicalizes_names() {
        let refs = ReferenceSet::from_names(["Radiohead", "\"Tame Impala\"", "radiohead"]);
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&normalize::canonicalize("RADIOHEAD")));
        assert!(refs.contains(&normalize::canonicalize("tame impala")));
        assert_eq!(refs.sorted_keys(), vec!["radiohead", "tame impala"]);
    }

    #[test]
    fn test_catalog_json_shape() {
        let json = r#"{
            "metadata": {"last_updated": null, "username": "", "total_discoveries": 0, "total_graduated": 0},
            "catalog": {
                "osees": {
                    "artist": "Osees",
                    "first_discovered": "16 Feb 2026, 08:00",
                    "last_listened": "16 Feb 2026, 08:00",
                    "track": "The Dream",
                    "artist_url": "https://www.last.fm/user/u/library/music/Osees",
                    "track_url": "https://www.last.fm/music/Osees/_/The%20Dream",
                    "graduated": false
                }
            }
        }"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        let entry = &catalog.entries[&normalize::canonicalize("Osees")];
        assert_eq!(entry.track, "The Dream");
        assert!(entry.graduated_date.is_none());

        // graduated_date stays out of the document until set
        let out = serde_json::to_string(&catalog).unwrap();
        assert!(!out.contains("graduated_date"));
        assert!(out.contains("\"catalog\""));
    }

    #[test]
    fn test_catalog_metadata_accepts_python_isoformat() {
        let json = r#"{"last_updated": "2026-02-17T09:30:12.345678-08:00", "username": "u",
                       "total_discoveries": 3, "total_graduated": 1}"#;
        let meta: CatalogMetadata = serde_json::from_str(json).unwrap();
        assert!(meta.last_updated.is_some());
        assert_eq!(meta.total_discoveries, 3);
    }

    #[test]
    fn test_play_event_cache_shape() {
        let e: PlayEvent = serde_json::from_str(
            r#"{"artist": "Sault", "track": "Free", "timestamp": "11 Feb 2026, 07:30"}"#,
        )
        .unwrap();
        assert_eq!(e, PlayEvent::new("Sault", "Free", "11 Feb 2026, 07:30"));
    }
}
