use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{io_err, write_json_atomic};
use crate::models::PlayEvent;

/// The resume file exists but can't be used.
#[derive(Error, Debug)]
pub enum ResumeError {
    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed cached state in {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A fetch result plus the time it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPhase<T> {
    pub fetched_at: DateTime<FixedOffset>,
    pub data: T,
}

impl<T> CachedPhase<T> {
    pub fn age(&self, now: DateTime<FixedOffset>) -> chrono::Duration {
        now.signed_duration_since(self.fetched_at)
    }

    /// Age in fractional hours, for log output.
    pub fn age_hours(&self, now: DateTime<FixedOffset>) -> f64 {
        self.age(now).num_seconds() as f64 / 3600.0
    }
}

/// Partial results of an interrupted run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeCache {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_tracks: Option<CachedPhase<Vec<PlayEvent>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_artists: Option<CachedPhase<Vec<String>>>,
}

impl ResumeCache {
    pub fn is_empty(&self) -> bool {
        self.recent_tracks.is_none() && self.top_artists.is_none()
    }
}

/// On-disk home of the [`ResumeCache`].
pub struct ResumeStore {
    path: PathBuf,
}

impl ResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cache file. `Ok(None)` if there is none.
    pub fn read(&self) -> Result<Option<ResumeCache>, ResumeError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).map_err(|source| ResumeError::Unreadable {
                path: self.path.clone(),
                source,
            })?;
        let cache = serde_json::from_str(&contents).map_err(|source| ResumeError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(cache))
    }

    /// Read the cache, treating a missing or broken file as empty.
    pub fn load(&self) -> ResumeCache {
        match self.read() {
            Ok(Some(cache)) => cache,
            Ok(None) => ResumeCache::default(),
            Err(e) => {
                log::warn!("{e}. Ignoring cached state.");
                ResumeCache::default()
            }
        }
    }

    pub fn save(&self, cache: &ResumeCache) -> super::Result<()> {
        write_json_atomic(&self.path, cache)
    }

    /// Delete the cache file. Returns whether a file was removed.
    pub fn clear(&self) -> super::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&self.path)(e)),
        }
    }
}
