//! Coverage Persistence
//!
//! One snapshot file per OS process, `<temp_dir>/<pid>.json`. Processes never
//! share a file, so no locking is needed; flushing the same process twice
//! just overwrites its own snapshot.

use crate::cache::HashCache;
use crate::coverage::{CoverageAccumulator, CoverageMap};
use crate::result::CovResult;
use crate::source_map::SourceMapCache;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes this process's coverage snapshot
#[derive(Debug, Clone)]
pub struct CoverageWriter {
    temp_dir: PathBuf,
    enable_cache: bool,
    hashes: HashCache,
    source_maps: SourceMapCache,
    pid: u32,
}

impl CoverageWriter {
    /// Writer for the current process
    #[must_use]
    pub fn new(
        temp_dir: impl Into<PathBuf>,
        enable_cache: bool,
        hashes: HashCache,
        source_maps: SourceMapCache,
    ) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            enable_cache,
            hashes,
            source_maps,
            pid: std::process::id(),
        }
    }

    /// Write under another process id
    #[must_use]
    pub const fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Target file of [`flush`](Self::flush)
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        snapshot_path(&self.temp_dir, self.pid)
    }

    /// Serialize the accumulator to the snapshot file.
    ///
    /// With the cache on, each record gets the content hash it was
    /// instrumented with so maps can be resolved later. With it off, maps
    /// registered in this process are applied now. The accumulator itself is
    /// never modified, so repeated flushes write the same document.
    ///
    /// Returns `None` when nothing has been recorded.
    pub fn flush(&self, coverage: &CoverageAccumulator) -> CovResult<Option<PathBuf>> {
        let mut snapshot = coverage.snapshot();
        if snapshot.is_empty() {
            tracing::debug!("no coverage recorded, skipping flush");
            return Ok(None);
        }

        if self.enable_cache {
            self.annotate(&mut snapshot);
        } else {
            self.source_maps.apply_maps(&mut snapshot);
        }

        let path = self.snapshot_path();
        let json = serde_json::to_string(&snapshot)?;
        fs::write(&path, json)?;
        tracing::info!(path = %path.display(), files = snapshot.len(), "coverage written");
        Ok(Some(path))
    }

    fn annotate(&self, snapshot: &mut CoverageMap) {
        for (key, file) in snapshot.iter_mut() {
            if let Some(hash) = self.hashes.get(key) {
                file.content_hash = Some(hash);
            }
        }
    }
}

/// `<temp_dir>/<pid>.json`
#[must_use]
pub fn snapshot_path(temp_dir: &Path, pid: u32) -> PathBuf {
    temp_dir.join(format!("{pid}.json"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::coverage::{FileCoverage, Position, Range};
    use crate::source_map::SourceMap;

    const MAP: &str = r#"{"version":3,"sources":["a.ts"],"names":[],"mappings":"AAIE,SAAI"}"#;

    fn accumulator() -> CoverageAccumulator {
        let acc = CoverageAccumulator::new();
        acc.register(
            "a.js",
            FileCoverage::new("a.js")
                .with_statement("0", Range::new(Position::new(1, 0), Position::new(1, 9))),
        );
        acc.hit_statement("a.js", "0");
        acc
    }

    fn read(path: &Path) -> CoverageMap {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_accumulator_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CoverageWriter::new(dir.path(), false, HashCache::new(), SourceMapCache::new());
        assert!(writer.flush(&CoverageAccumulator::new()).unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_snapshot_named_by_pid() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CoverageWriter::new(dir.path(), false, HashCache::new(), SourceMapCache::new())
            .with_pid(4242);
        let path = writer.flush(&accumulator()).unwrap().unwrap();
        assert_eq!(path, dir.path().join("4242.json"));
        assert_eq!(read(&path)["a.js"].s["0"], 1);
    }

    #[test]
    fn test_cache_mode_annotates_hash_only() {
        let dir = tempfile::tempdir().unwrap();
        let hashes = HashCache::new();
        hashes.record("a.js", "deadbeef");
        let maps = SourceMapCache::new();
        maps.add_map("a.js", SourceMap::from_json(MAP).unwrap());

        let writer = CoverageWriter::new(dir.path(), true, hashes, maps);
        let snapshot = read(&writer.flush(&accumulator()).unwrap().unwrap());
        let file = &snapshot["a.js"];
        assert_eq!(file.content_hash.as_deref(), Some("deadbeef"));
        assert_eq!(file.statement_map["0"].start, Position::new(1, 0));
    }

    #[test]
    fn test_eager_mode_applies_maps() {
        let dir = tempfile::tempdir().unwrap();
        let hashes = HashCache::new();
        hashes.record("a.js", "deadbeef");
        let maps = SourceMapCache::new();
        maps.add_map("a.js", SourceMap::from_json(MAP).unwrap());

        let writer = CoverageWriter::new(dir.path(), false, hashes, maps);
        let snapshot = read(&writer.flush(&accumulator()).unwrap().unwrap());
        let file = &snapshot["a.js"];
        assert!(file.content_hash.is_none());
        assert_eq!(file.statement_map["0"].start, Position::new(5, 2));
    }

    #[test]
    fn test_flush_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let maps = SourceMapCache::new();
        maps.add_map("a.js", SourceMap::from_json(MAP).unwrap());
        let writer = CoverageWriter::new(dir.path(), false, HashCache::new(), maps);
        let acc = accumulator();

        let path = writer.flush(&acc).unwrap().unwrap();
        let first = fs::read_to_string(&path).unwrap();
        writer.flush(&acc).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_missing_temp_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CoverageWriter::new(
            dir.path().join("gone"),
            false,
            HashCache::new(),
            SourceMapCache::new(),
        );
        assert!(writer.flush(&accumulator()).is_err());
    }
}
