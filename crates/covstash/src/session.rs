//! Coverage session: wires configuration, classifier, cache, source maps
//! and persistence together for one process.

use crate::aggregate::{Collector, ReportAggregator, Reporter};
use crate::cache::{clear_dir, HashCache, InstrumentFactory, Salt, TransformCache};
use crate::classify::Classifier;
use crate::config::CovConfig;
use crate::coverage::{CoverageAccumulator, CoverageMap};
use crate::engine::{Instrumenter, Runtime};
use crate::interceptor::{
    absolutize, relative_path, resolve_preload, strip_bom, FileRecord, InstrumentingProvider,
    SourceProvider,
};
use crate::persist::CoverageWriter;
use crate::result::CovResult;
use crate::shutdown::{HookPhase, ShutdownHooks};
use crate::source_map::SourceMapCache;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Extension of files picked up by [`Session::add_all_files`]
const SCRIPT_EXT: &str = "js";

/// One process's coverage session
pub struct Session {
    config: CovConfig,
    engine: Arc<dyn Instrumenter>,
    classifier: Arc<Classifier>,
    transform: Arc<TransformCache>,
    hashes: HashCache,
    source_maps: SourceMapCache,
    coverage: CoverageAccumulator,
    hooks: ShutdownHooks,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("engine", &self.engine.version())
            .field("transform", &self.transform)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session. The snapshot directory is created here so that a
    /// later flush cannot fail on a missing directory.
    pub fn new(config: CovConfig, engine: Arc<dyn Instrumenter>) -> CovResult<Self> {
        fs::create_dir_all(config.temp_dir())?;

        let classifier = Arc::new(Classifier::from_config(&config)?);
        let hashes = HashCache::new();
        let source_maps = SourceMapCache::new();
        let cache_dir = config.cache_dir();
        let factory = InstrumentFactory::new(Arc::clone(&engine), source_maps.clone(), &cache_dir);
        let transform = Arc::new(TransformCache::new(
            Box::new(factory),
            Salt::new(&engine.version()),
            cache_dir,
            config.enable_cache,
            hashes.clone(),
        )?);

        tracing::debug!(
            cwd = %config.cwd.display(),
            cache = config.enable_cache,
            "coverage session created"
        );

        Ok(Self {
            config,
            engine,
            classifier,
            transform,
            hashes,
            source_maps,
            coverage: CoverageAccumulator::new(),
            hooks: ShutdownHooks::new(),
        })
    }

    /// Loader hook for this session
    #[must_use]
    pub fn provider(&self) -> InstrumentingProvider {
        InstrumentingProvider::new(
            self.config.cwd.clone(),
            Arc::clone(&self.classifier),
            Arc::clone(&self.transform),
        )
    }

    /// Classifier decision for one file
    #[must_use]
    pub fn should_instrument_file(&self, absolute: &Path, relative: &str) -> bool {
        self.classifier.should_instrument(absolute, relative)
    }

    /// Read a file from disk and run it through the provider
    pub fn add_file(&self, path: &Path) -> CovResult<FileRecord> {
        let absolute = absolutize(&self.config.cwd, path);
        let source = fs::read_to_string(&absolute)?;
        self.provider()
            .provide(&absolute, strip_bom(&source).to_string())
    }

    /// Scripts under the working directory that the classifier accepts,
    /// in walk order. Dependency directories are never descended into.
    pub fn matching_files(&self) -> Vec<PathBuf> {
        let walker = WalkDir::new(&self.config.cwd)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_dependency_dir(entry));

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable path");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXT)
            {
                continue;
            }
            let relative = relative_path(&self.config.cwd, path);
            if self.classifier.should_instrument(path, &relative) {
                files.push(path.to_path_buf());
            }
        }
        files
    }

    /// Instrument every matching script and evaluate its preamble, so files
    /// never loaded during the run still report zero coverage. Flushes
    /// afterwards and returns the number of files added.
    pub fn add_all_files(&self, runtime: &mut dyn Runtime) -> CovResult<usize> {
        let mut added = 0;
        for path in self.matching_files() {
            let record = self.add_file(&path)?;
            if record.instrumented {
                let preamble = self.engine.preamble(&record.content, &record.relative_path);
                runtime.evaluate(&preamble, &record.absolute_path, &self.coverage)?;
                added += 1;
            }
        }

        tracing::info!(files = added, "bulk instrumentation complete");
        self.write_coverage_file()?;
        Ok(added)
    }

    /// Install the loader hook, schedule the exit flush and preload the
    /// configured modules.
    ///
    /// The flush goes into the terminal phase of [`Session::hooks`]; pass
    /// those hooks to [`install_exit_triggers`](crate::install_exit_triggers)
    /// to reach every exit path.
    pub fn wrap(&self, runtime: &mut dyn Runtime) -> CovResult<()> {
        let provider: Arc<dyn SourceProvider> = Arc::new(self.provider());
        runtime.install(provider);

        let writer = self.writer();
        let coverage = self.coverage.clone();
        self.hooks
            .register(HookPhase::Terminal, move || writer.flush(&coverage).map(|_| ()));

        for name in &self.config.require {
            let target = resolve_preload(&self.config.cwd, name);
            tracing::debug!(module = %target, "preloading");
            runtime.preload(&target)?;
        }
        Ok(())
    }

    /// Snapshot writer for this process
    #[must_use]
    pub fn writer(&self) -> CoverageWriter {
        CoverageWriter::new(
            self.config.temp_dir(),
            self.config.enable_cache,
            self.hashes.clone(),
            self.source_maps.clone(),
        )
    }

    /// Flush this process's coverage now
    pub fn write_coverage_file(&self) -> CovResult<Option<PathBuf>> {
        self.writer().flush(&self.coverage)
    }

    /// Aggregator over this session's directories
    #[must_use]
    pub fn aggregator(&self) -> ReportAggregator {
        ReportAggregator::new(self.config.temp_dir(), self.config.cache_dir())
    }

    /// Every snapshot of the run, remapped
    pub fn load_reports(&self) -> CovResult<Vec<CoverageMap>> {
        self.aggregator().load_reports()
    }

    /// Feed every snapshot to `collector` and render the configured reports
    pub fn report(&self, collector: &mut dyn Collector, reporter: &mut dyn Reporter) -> CovResult<()> {
        for report in self.load_reports()? {
            collector.add(report);
        }
        for name in &self.config.reporter {
            reporter.add(name);
        }
        reporter.write(collector)
    }

    /// Remove the snapshot directory, unless a parent run owns it
    pub fn cleanup(&self) -> CovResult<()> {
        if self.config.subprocess {
            tracing::debug!("subprocess, leaving snapshots in place");
            return Ok(());
        }
        clear_dir(&self.config.temp_dir())
    }

    /// Start a fresh run: drop earlier snapshots and recreate the directory
    pub fn reset(&self) -> CovResult<()> {
        clear_dir(&self.config.temp_dir())?;
        fs::create_dir_all(self.config.temp_dir())?;
        Ok(())
    }

    /// Remove the transform cache
    pub fn clear_cache(&self) -> CovResult<()> {
        self.transform.clear()
    }

    /// Effective configuration
    #[must_use]
    pub fn config(&self) -> &CovConfig {
        &self.config
    }

    /// Include/exclude decision for this session
    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Counters shared with the runtime
    #[must_use]
    pub fn coverage(&self) -> &CoverageAccumulator {
        &self.coverage
    }

    /// Content hash per file key
    #[must_use]
    pub fn hashes(&self) -> &HashCache {
        &self.hashes
    }

    /// Maps detected while the cache is off
    #[must_use]
    pub fn source_maps(&self) -> &SourceMapCache {
        &self.source_maps
    }

    /// Exit hooks; the coverage flush is registered by [`Session::wrap`]
    #[must_use]
    pub fn hooks(&self) -> &ShutdownHooks {
        &self.hooks
    }

    /// Snapshot directory
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.config.temp_dir()
    }

    /// Transform cache directory
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.config.cache_dir()
    }
}

fn is_dependency_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == "node_modules"
}
