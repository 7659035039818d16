use std::path::{Path, PathBuf};

use super::{Result, StoreError, io_err, write_json_atomic};
use crate::models::Catalog;

/// Whole-document JSON store for the discovery catalog.
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog, or an empty one if the file doesn't exist yet.
    ///
    /// A file that exists but can't be parsed is an error: silently starting
    /// over would drop every prior discovery on the next save.
    pub fn load(&self) -> Result<Catalog> {
        if !self.path.exists() {
            log::info!("No catalog at {}, starting fresh", self.path.display());
            return Ok(Catalog::default());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(io_err(&self.path))?;
        let catalog: Catalog =
            serde_json::from_str(&contents).map_err(|source| StoreError::CatalogCorrupt {
                path: self.path.clone(),
                source,
            })?;

        log::debug!(
            "Loaded {} catalog entries from {}",
            catalog.entries.len(),
            self.path.display()
        );
        Ok(catalog)
    }

    /// Replace the stored catalog with `catalog`.
    pub fn save(&self, catalog: &Catalog) -> Result<()> {
        write_json_atomic(&self.path, catalog)?;
        log::debug!("Wrote {} entries to {}", catalog.entries.len(), self.path.display());
        Ok(())
    }
}
