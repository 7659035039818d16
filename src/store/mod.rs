pub mod catalog;
pub mod resume;

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub use catalog::CatalogStore;
pub use resume::ResumeStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Catalog {path} is unreadable (refusing to overwrite history): {source}")]
    CatalogCorrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize `value` as pretty JSON and replace `path` with it.
///
/// Writes to a sibling temp file first and renames it over the target, so a
/// crash mid-write leaves the previous document in place.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(io_err(&parent))?;

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("store");
    let tmp = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));
    let written = write_synced(&tmp, &bytes)
        .and_then(|()| std::fs::rename(&tmp, path).map_err(io_err(path)));
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

fn write_synced(tmp: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = std::fs::File::create(tmp).map_err(io_err(tmp))?;
    f.write_all(bytes).map_err(io_err(tmp))?;
    f.write_all(b"\n").map_err(io_err(tmp))?;
    f.sync_all().map_err(io_err(tmp))
}
