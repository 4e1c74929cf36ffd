//! Content-Addressed Transform Cache
//!
//! ```text
//! transform(source, meta)
//!     │  hash = H(source, filename, salt) ──► HashCache[file key]
//!     ▼
//! cache on?  ──no──► factory(source, meta, None)
//!     │yes
//!     ▼
//! <cache_dir>/<hash>.js exists? ──yes──► return it
//!     │no
//!     ▼
//! factory(source, meta, Some(hash)) ──► write <hash>.js (and <hash>.map)
//! ```
//!
//! Entries are pure functions of their key, so they are never invalidated:
//! a changed file or engine version produces a new hash. Clearing the cache
//! is always safe.

mod factory;
mod hash;

pub use factory::InstrumentFactory;
pub use hash::{content_hash, HashCache, Salt};

use crate::result::CovResult;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Extension of cached instrumented code
pub const CODE_EXT: &str = "js";

/// Extension of cached source maps
pub const MAP_EXT: &str = "map";

/// Path of the cached instrumented code for `hash`
#[must_use]
pub fn code_path(cache_dir: &Path, hash: &str) -> PathBuf {
    cache_dir.join(format!("{hash}.{CODE_EXT}"))
}

/// Path of the cached source map for `hash`
#[must_use]
pub fn map_path(cache_dir: &Path, hash: &str) -> PathBuf {
    cache_dir.join(format!("{hash}.{MAP_EXT}"))
}

/// Identity of the file being transformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Absolute path of the file on disk
    pub filename: PathBuf,
    /// Relative file key (forward slashes, no leading `./`)
    pub file_key: String,
}

impl FileMeta {
    /// Create metadata for one file
    #[must_use]
    pub fn new(filename: impl Into<PathBuf>, file_key: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            file_key: file_key.into(),
        }
    }
}

/// Produces instrumented output on a cache miss
pub trait TransformFactory: Send + Sync {
    /// Instrument `source`. `hash` is present only when the disk cache is
    /// enabled, so side artifacts can be stored next to the entry.
    fn create(&self, source: &str, meta: &FileMeta, hash: Option<&str>) -> CovResult<String>;
}

/// Disk-backed transform cache in front of a [`TransformFactory`]
pub struct TransformCache {
    factory: Box<dyn TransformFactory>,
    salt: Salt,
    cache_dir: PathBuf,
    enabled: bool,
    hashes: HashCache,
}

impl std::fmt::Debug for TransformCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCache")
            .field("salt", &self.salt)
            .field("cache_dir", &self.cache_dir)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl TransformCache {
    /// Create a cache; when enabled, `cache_dir` is created immediately.
    pub fn new(
        factory: Box<dyn TransformFactory>,
        salt: Salt,
        cache_dir: impl Into<PathBuf>,
        enabled: bool,
        hashes: HashCache,
    ) -> CovResult<Self> {
        let cache_dir = cache_dir.into();
        if enabled {
            fs::create_dir_all(&cache_dir)?;
        }
        Ok(Self {
            factory,
            salt,
            cache_dir,
            enabled,
            hashes,
        })
    }

    /// Whether disk entries are read and written
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Root directory of cache entries
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Salt folded into every hash
    #[must_use]
    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    /// Instrument `source`, serving from disk when possible.
    ///
    /// Engine failures propagate; cache read and write failures do not.
    pub fn transform(&self, source: &str, meta: &FileMeta) -> CovResult<String> {
        let hash = content_hash(source, &meta.filename.to_string_lossy(), &self.salt);
        self.hashes.record(&meta.file_key, &hash);

        if !self.enabled {
            return self.factory.create(source, meta, None);
        }

        let entry = code_path(&self.cache_dir, &hash);
        match fs::read_to_string(&entry) {
            Ok(cached) => {
                tracing::debug!(file = %meta.file_key, hash, "transform cache hit");
                return Ok(cached);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(file = %meta.file_key, hash, "transform cache miss");
            }
            Err(e) => {
                tracing::warn!(path = %entry.display(), error = %e, "unreadable cache entry, re-instrumenting");
            }
        }

        let output = self.factory.create(source, meta, Some(&hash))?;
        if let Err(e) = write_entry(&self.cache_dir, &entry, output.as_bytes()) {
            tracing::warn!(path = %entry.display(), error = %e, "failed to persist cache entry");
        }
        Ok(output)
    }

    /// Delete every entry by removing the cache directory
    pub fn clear(&self) -> CovResult<()> {
        clear_dir(&self.cache_dir)
    }
}

/// Write through a temp file and rename, so readers never see a torn entry.
pub(crate) fn write_entry(dir: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a directory tree; a missing directory is not an error
pub(crate) fn clear_dir(dir: &Path) -> CovResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
