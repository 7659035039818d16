pub mod acquire;
pub mod config;
pub mod dedup;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod run;
pub mod source;
pub mod store;

/// Track names containing any of these (case-insensitive) are never cataloged.
pub const TRACK_NAME_FILTERS: &[&str] = &["trailer"];

/// Application name for XDG paths
pub const APP_NAME: &str = "newfound";

/// Catalog file name inside the data directory.
pub const CATALOG_FILE: &str = "discovery_catalog.json";

/// Resume cache file name inside the data directory.
pub const STATE_FILE: &str = "state.json";
