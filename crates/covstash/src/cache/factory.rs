//! Transform factory backed by the instrumentation engine

use super::{map_path, write_entry, FileMeta, TransformFactory};
use crate::engine::Instrumenter;
use crate::result::CovResult;
use crate::source_map::{detect, SourceMapCache};
use std::path::PathBuf;
use std::sync::Arc;

/// Detects a source map for the file, then runs the engine.
///
/// With a content hash the map goes to `<cache_dir>/<hash>.map` so other
/// processes can find it; without one it is registered in memory under the
/// file key.
pub struct InstrumentFactory {
    engine: Arc<dyn Instrumenter>,
    source_maps: SourceMapCache,
    cache_dir: PathBuf,
}

impl std::fmt::Debug for InstrumentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentFactory")
            .field("engine", &self.engine.version())
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl InstrumentFactory {
    /// Factory writing hashed maps under `cache_dir`
    #[must_use]
    pub fn new(
        engine: Arc<dyn Instrumenter>,
        source_maps: SourceMapCache,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            source_maps,
            cache_dir: cache_dir.into(),
        }
    }
}

impl TransformFactory for InstrumentFactory {
    fn create(&self, source: &str, meta: &FileMeta, hash: Option<&str>) -> CovResult<String> {
        if let Some(map) = detect(source, &meta.filename) {
            match hash {
                Some(hash) => {
                    let path = map_path(&self.cache_dir, hash);
                    if let Err(e) = write_entry(&self.cache_dir, &path, map.to_json().as_bytes()) {
                        tracing::warn!(path = %path.display(), error = %e, "failed to store source map");
                    }
                }
                None => self.source_maps.add_map(&meta.file_key, map),
            }
        }

        tracing::debug!(file = %meta.file_key, "instrumenting");
        self.engine.instrument(source, &meta.file_key)
    }
}
