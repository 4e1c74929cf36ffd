//! Report Aggregator
//!
//! Reads every snapshot in the shared temp directory and remaps locations
//! to original source. Merging across processes belongs to the
//! [`Collector`]; this module only hands over remapped per-process maps.

use crate::coverage::CoverageMap;
use crate::result::CovResult;
use crate::source_map::SourceMapCache;
use std::fs;
use std::path::{Path, PathBuf};

/// Consumer of per-process coverage maps
pub trait Collector {
    /// Accept one process's snapshot
    fn add(&mut self, coverage: CoverageMap);

    /// Everything added so far, merged per file
    fn merged(&self) -> CoverageMap;
}

/// Renders the collector's output
pub trait Reporter {
    /// Enable a named report format
    fn add(&mut self, name: &str);

    /// Produce every enabled report
    fn write(&mut self, collector: &dyn Collector) -> CovResult<()>;
}

/// Collector that sums hit counts of files seen in several snapshots
#[derive(Debug, Clone, Default)]
pub struct MergingCollector {
    merged: CoverageMap,
    snapshots: usize,
}

impl MergingCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots added
    #[must_use]
    pub fn snapshots(&self) -> usize {
        self.snapshots
    }
}

impl Collector for MergingCollector {
    fn add(&mut self, coverage: CoverageMap) {
        self.snapshots += 1;
        for (key, file) in coverage {
            match self.merged.get_mut(&key) {
                Some(existing) => existing.merge(&file),
                None => {
                    self.merged.insert(key, file);
                }
            }
        }
    }

    fn merged(&self) -> CoverageMap {
        self.merged.clone()
    }
}

/// Loads and remaps all snapshots of one run
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    temp_dir: PathBuf,
    cache_dir: PathBuf,
    source_maps: SourceMapCache,
}

impl ReportAggregator {
    /// Aggregator whose hash lookups are memoized for the lifetime of this
    /// value.
    #[must_use]
    pub fn new(temp_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            cache_dir: cache_dir.into(),
            source_maps: SourceMapCache::new(),
        }
    }

    /// Memoized hash-to-map lookups
    #[must_use]
    pub fn source_maps(&self) -> &SourceMapCache {
        &self.source_maps
    }

    /// Snapshot files in the temp directory, sorted by name
    pub fn snapshot_files(&self) -> CovResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.temp_dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// One remapped coverage map per snapshot file.
    ///
    /// Only records carrying a `contentHash` are remapped here. Records
    /// without one come from processes that ran with the cache off, whose
    /// flush already applied their in-memory maps, so they are returned as
    /// written. A process's in-memory maps are never consulted at report
    /// time.
    ///
    /// Corrupt snapshots come back empty. Only a failure to list the
    /// directory is an error.
    pub fn load_reports(&self) -> CovResult<Vec<CoverageMap>> {
        let files = self.snapshot_files()?;
        let reports: Vec<CoverageMap> = files.iter().map(|path| self.load_one(path)).collect();
        tracing::info!(
            snapshots = reports.len(),
            maps = self.source_maps.resolved_hashes(),
            "loaded coverage reports"
        );
        Ok(reports)
    }

    fn load_one(&self, path: &Path) -> CoverageMap {
        let mut report = read_snapshot(path);
        // Key registrations are per snapshot: another process may have
        // recorded the same file key from different content.
        let maps = SourceMapCache::new();
        for (key, file) in &report {
            if let Some(hash) = &file.content_hash {
                if let Some(map) = self.source_maps.resolve_hash(hash, &self.cache_dir) {
                    maps.add_shared(key, map);
                }
            }
        }
        maps.apply_maps(&mut report);
        report
    }
}

/// Parse one snapshot; anything unreadable is an empty map
fn read_snapshot(path: &Path) -> CoverageMap {
    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::from_str::<CoverageMap>(&json).map_err(|e| e.to_string()));
    match parsed {
        Ok(report) => report,
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "skipping unreadable snapshot");
            CoverageMap::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::map_path;
    use crate::coverage::{FileCoverage, Position, Range};

    const MAP: &str = r#"{"version":3,"sources":["a.ts"],"names":[],"mappings":"AAIE,SAAI"}"#;

    fn record(hits: u64, hash: Option<&str>) -> FileCoverage {
        let mut file = FileCoverage::new("a.js")
            .with_statement("0", Range::new(Position::new(1, 0), Position::new(1, 9)));
        file.s.insert("0".into(), hits);
        file.content_hash = hash.map(str::to_string);
        file
    }

    fn write_snapshot(dir: &Path, name: &str, file: FileCoverage) {
        let mut map = CoverageMap::new();
        map.insert("a.js".to_string(), file);
        fs::write(dir.join(name), serde_json::to_string(&map).unwrap()).unwrap();
    }

    #[test]
    fn test_missing_temp_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = ReportAggregator::new(dir.path().join("nope"), dir.path());
        assert!(aggregator.load_reports().is_err());
    }

    #[test]
    fn test_reports_sorted_by_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        write_snapshot(tmp.path(), "200.json", record(2, None));
        write_snapshot(tmp.path(), "100.json", record(1, None));

        let reports = ReportAggregator::new(tmp.path(), tmp.path()).load_reports().unwrap();
        assert_eq!(reports[0]["a.js"].s["0"], 1);
        assert_eq!(reports[1]["a.js"].s["0"], 2);
    }

    #[test]
    fn test_corrupt_snapshot_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("1.json"), "{\"a.js\": {\"s\": ").unwrap();
        write_snapshot(tmp.path(), "2.json", record(3, None));

        let reports = ReportAggregator::new(tmp.path(), tmp.path()).load_reports().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].is_empty());
        assert_eq!(reports[1]["a.js"].s["0"], 3);
    }

    #[test]
    fn test_hash_annotated_record_remapped() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(map_path(cache.path(), "h1"), MAP).unwrap();
        write_snapshot(tmp.path(), "1.json", record(1, Some("h1")));

        let aggregator = ReportAggregator::new(tmp.path(), cache.path());
        let reports = aggregator.load_reports().unwrap();
        let start = reports[0]["a.js"].statement_map["0"].start;
        assert_eq!(start, Position::new(5, 2));
    }

    #[test]
    fn test_repeated_hash_read_once() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(map_path(cache.path(), "h1"), MAP).unwrap();
        write_snapshot(tmp.path(), "1.json", record(1, Some("h1")));
        write_snapshot(tmp.path(), "2.json", record(1, Some("h1")));
        write_snapshot(tmp.path(), "3.json", record(1, Some("missing")));

        let aggregator = ReportAggregator::new(tmp.path(), cache.path());
        let reports = aggregator.load_reports().unwrap();
        assert_eq!(aggregator.source_maps().resolved_hashes(), 2);
        assert_eq!(reports[1]["a.js"].statement_map["0"].start, Position::new(5, 2));
        assert_eq!(reports[2]["a.js"].statement_map["0"].start, Position::new(1, 0));
    }

    #[test]
    fn test_record_without_hash_left_unmapped() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs::write(map_path(cache.path(), "h1"), MAP).unwrap();
        write_snapshot(tmp.path(), "1.json", record(1, None));

        let reports = ReportAggregator::new(tmp.path(), cache.path()).load_reports().unwrap();
        assert_eq!(reports[0]["a.js"].statement_map["0"].start, Position::new(1, 0));
    }

    #[test]
    fn test_merging_collector_sums_hits() {
        let mut collector = MergingCollector::new();
        let mut one = CoverageMap::new();
        one.insert("a.js".into(), record(2, None));
        let mut two = CoverageMap::new();
        two.insert("a.js".into(), record(5, None));
        collector.add(one);
        collector.add(two);

        assert_eq!(collector.snapshots(), 2);
        assert_eq!(collector.merged()["a.js"].s["0"], 7);
    }
}
