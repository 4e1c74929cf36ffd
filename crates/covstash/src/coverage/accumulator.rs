//! Process-wide coverage accumulator
//!
//! Instrumented code running in this process records hits here; the exit
//! flush reads it. Handles are cheap clones over one shared map so the
//! runtime, the signal thread and the panic hook all see the same counters.

use super::{CoverageMap, FileCoverage};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared handle to this process's coverage counters
#[derive(Debug, Clone, Default)]
pub struct CoverageAccumulator {
    inner: Arc<Mutex<CoverageMap>>,
}

impl CoverageAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CoverageMap> {
        // Counters stay usable after a panic elsewhere; the flush must still run.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a file's zero-count record unless one already exists.
    ///
    /// Returns `true` when the record was inserted.
    pub fn register(&self, key: &str, record: FileCoverage) -> bool {
        let mut map = self.lock();
        if map.contains_key(key) {
            return false;
        }
        map.insert(key.to_string(), record);
        true
    }

    /// Count one execution of a statement
    pub fn hit_statement(&self, key: &str, id: &str) {
        if let Some(file) = self.lock().get_mut(key) {
            *file.s.entry(id.to_string()).or_insert(0) += 1;
        }
    }

    /// Count one call of a function
    pub fn hit_function(&self, key: &str, id: &str) {
        if let Some(file) = self.lock().get_mut(key) {
            *file.f.entry(id.to_string()).or_insert(0) += 1;
        }
    }

    /// Count one traversal of a branch arm
    pub fn hit_branch(&self, key: &str, id: &str, arm: usize) {
        if let Some(file) = self.lock().get_mut(key) {
            let arms = file.b.entry(id.to_string()).or_default();
            if arms.len() <= arm {
                arms.resize(arm + 1, 0);
            }
            arms[arm] += 1;
        }
    }

    /// Copy of the current counters
    #[must_use]
    pub fn snapshot(&self) -> CoverageMap {
        self.lock().clone()
    }

    /// Number of files with a record
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no file has been registered yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
