use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::Deserialize;

/// Timezone used for display timestamps when none is configured.
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Last.fm username (overridden by `--username`).
    pub username: Option<String>,
    /// Days of listening history to scan.
    pub lookback_days: i64,
    /// Size of the all-time top artist list a discovery must be absent from.
    pub top_limit: usize,
    /// Where the catalog and resume state live (overrides XDG default).
    pub data_dir: Option<PathBuf>,
    /// IANA timezone for stored timestamps.
    pub timezone: String,
    /// Resume cache settings.
    pub cache: CacheConfig,
    /// Last.fm API settings.
    pub lastfm: LastFmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            username: None,
            lookback_days: 7,
            top_limit: 1000,
            data_dir: None,
            timezone: DEFAULT_TIMEZONE.to_string(),
            cache: CacheConfig::default(),
            lastfm: LastFmConfig::default(),
        }
    }
}

/// Resume cache freshness windows.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Hours a cached recent-tracks fetch stays usable.
    pub recent_ttl_hours: i64,
    /// Hours a cached top-artists fetch stays usable.
    pub top_ttl_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            recent_ttl_hours: 6,
            top_ttl_hours: 24,
        }
    }
}

/// Last.fm API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LastFmConfig {
    /// Minimum delay between API requests in milliseconds.
    pub rate_limit_ms: u64,
}

impl Default for LastFmConfig {
    fn default() -> Self {
        Self { rate_limit_ms: 200 }
    }
}

impl AppConfig {
    /// Load config from `~/.config/newfound/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from a specific file.
    /// Logs a warning and falls back to defaults if it can't be read or parsed.
    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str::<AppConfig>(&contents) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse the configured timezone, falling back to [`DEFAULT_TIMEZONE`].
    pub fn resolve_timezone(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(e) => {
                log::warn!(
                    "Unknown timezone {:?} ({}), using {}",
                    self.timezone,
                    e,
                    DEFAULT_TIMEZONE
                );
                default_timezone()
            }
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn default_timezone() -> Tz {
    chrono_tz::America::Los_Angeles
}

/// Resolve the default data directory using XDG data directory.
pub fn default_data_dir() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        dirs.data_dir().to_path_buf()
    } else {
        // Fallback: current directory
        PathBuf::from("data")
    }
}

/// File locations inside a data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub catalog: PathBuf,
    pub state: PathBuf,
}

impl DataPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            catalog: dir.join(crate::CATALOG_FILE),
            state: dir.join(crate::STATE_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.lookback_days, 7);
        assert_eq!(config.top_limit, 1000);
        assert_eq!(config.cache.recent_ttl_hours, 6);
        assert_eq!(config.cache.top_ttl_hours, 24);
        assert_eq!(config.resolve_timezone(), chrono_tz::America::Los_Angeles);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
username = "listener"
timezone = "Europe/Berlin"

[cache]
recent_ttl_hours = 2
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.username.as_deref(), Some("listener"));
        assert_eq!(config.top_limit, 1000);
        assert_eq!(config.cache.recent_ttl_hours, 2);
        assert_eq!(config.cache.top_ttl_hours, 24);
        assert_eq!(config.lastfm.rate_limit_ms, 200);
        assert_eq!(config.resolve_timezone(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_bad_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "top_limit = \"lots\"").unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.top_limit, 1000);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_unknown_timezone_falls_back() {
        let config = AppConfig { timezone: "Mars/Olympus_Mons".into(), ..Default::default() };
        assert_eq!(config.resolve_timezone(), chrono_tz::America::Los_Angeles);
    }

    #[test]
    fn test_data_paths() {
        let paths = DataPaths::in_dir(Path::new("/tmp/nf"));
        assert_eq!(paths.catalog, Path::new("/tmp/nf/discovery_catalog.json"));
        assert_eq!(paths.state, Path::new("/tmp/nf/state.json"));
    }
}
