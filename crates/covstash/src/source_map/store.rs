//! Source map registry shared by the transform factory, the flush and the
//! report aggregator.
//!
//! Maps are registered either directly by file key (when they were detected
//! in this process) or looked up by content hash from the transform cache
//! directory. Hash lookups are memoized, misses included.

use super::{remap_file, SourceMap};
use crate::cache::map_path;
use crate::coverage::CoverageMap;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MapStore {
    by_key: HashMap<String, Arc<SourceMap>>,
    by_hash: HashMap<String, Option<Arc<SourceMap>>>,
}

/// Shared handle to the path-keyed and hash-keyed map stores
#[derive(Debug, Clone, Default)]
pub struct SourceMapCache {
    inner: Arc<Mutex<MapStore>>,
}

impl SourceMapCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MapStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `map` for the file `key`, replacing any earlier map
    pub fn add_map(&self, key: &str, map: SourceMap) {
        self.add_shared(key, Arc::new(map));
    }

    /// Register an already shared map for the file `key`
    pub fn add_shared(&self, key: &str, map: Arc<SourceMap>) {
        self.lock().by_key.insert(key.to_string(), map);
    }

    /// Map registered for `key`, if any
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<SourceMap>> {
        self.lock().by_key.get(key).cloned()
    }

    /// Number of files with a registered map
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().by_key.len()
    }

    /// Whether no file has a registered map
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().by_key.is_empty()
    }

    /// Load `<cache_dir>/<hash>.map` at most once.
    ///
    /// A missing or malformed map is remembered as absent and never retried.
    pub fn resolve_hash(&self, hash: &str, cache_dir: &Path) -> Option<Arc<SourceMap>> {
        if let Some(known) = self.lock().by_hash.get(hash) {
            return known.clone();
        }

        let path = map_path(cache_dir, hash);
        let loaded = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|json| SourceMap::from_json(&json).map_err(|e| e.to_string()));
        let resolved = match loaded {
            Ok(map) => Some(Arc::new(map)),
            Err(error) => {
                tracing::debug!(hash, path = %path.display(), error = %error, "no source map for content hash");
                None
            }
        };

        self.lock()
            .by_hash
            .insert(hash.to_string(), resolved.clone());
        resolved
    }

    /// Number of hashes looked up so far, hits and misses
    #[must_use]
    pub fn resolved_hashes(&self) -> usize {
        self.lock().by_hash.len()
    }

    /// Rewrite locations of every file with a registered map to original
    /// source coordinates. Returns the number of files rewritten.
    pub fn apply_maps(&self, coverage: &mut CoverageMap) -> usize {
        let store = self.lock();
        let mut applied = 0;
        for (key, file) in coverage.iter_mut() {
            if let Some(map) = store.by_key.get(key) {
                remap_file(file, map);
                applied += 1;
            }
        }
        applied
    }
}
