use crate::error::Result;
use crate::types::GeoLocation;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Place string → resolved location, memoized across runs.
///
/// The file is rewritten as a whole by [`GeocodeCache::persist`]. Entries are
/// only ever added; unresolved places are never stored, and `null` entries in
/// an older file are read as misses so they are retried.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: BTreeMap<String, GeoLocation>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl GeocodeCache {
    /// An empty cache that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing file starts an empty cache bound to it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let stored: BTreeMap<String, Option<GeoLocation>> = if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            };
            stored
                .into_iter()
                .filter_map(|(place, location)| location.map(|l| (place, l)))
                .collect()
        } else {
            BTreeMap::new()
        };
        info!("Loaded {} cached locations from {}", entries.len(), path.display());
        Ok(Self {
            entries,
            path: Some(path),
            dirty: false,
        })
    }

    pub fn get(&self, place: &str) -> Option<&GeoLocation> {
        self.entries.get(place)
    }

    pub fn put(&mut self, place: impl Into<String>, location: GeoLocation) {
        self.entries.insert(place.into(), location);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the backing file if anything was added since the last load or
    /// persist. No-op for in-memory caches.
    pub fn persist(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            debug!("Geocode cache unchanged, not rewriting {}", path.display());
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json)?;
        debug!("Persisted {} locations to {}", self.entries.len(), path.display());
        self.dirty = false;
        Ok(())
    }
}
