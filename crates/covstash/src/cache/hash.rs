//! Content hashing and the process-local hash registry

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Versioning salt mixed into every content hash.
///
/// Upgrading either the engine or this tool changes the salt and thereby
/// every cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt(String);

#[derive(Serialize)]
struct SaltFields<'a> {
    engine: &'a str,
    tool: &'a str,
}

impl Salt {
    /// Salt for `engine_version` and this crate's own version
    #[must_use]
    pub fn new(engine_version: &str) -> Self {
        Self::from_versions(engine_version, env!("CARGO_PKG_VERSION"))
    }

    /// Salt for explicit engine and tool versions
    #[must_use]
    pub fn from_versions(engine: &str, tool: &str) -> Self {
        // Serializing two string fields cannot fail.
        let json = serde_json::to_string(&SaltFields { engine, tool })
            .unwrap_or_else(|_| format!("{engine}\u{0}{tool}"));
        Self(json)
    }

    /// Serialized salt
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// SHA-256 over `(source, filename, salt)`, lowercase hex.
///
/// Each part is length-prefixed so distinct triples never share an input.
#[must_use]
pub fn content_hash(source: &str, filename: &str, salt: &Salt) -> String {
    let mut hasher = Sha256::new();
    for part in [source, filename, salt.as_str()] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let result = hasher.finalize();
    format!("{result:x}")
}

/// Most recent content hash per file key, for this process only
#[derive(Debug, Clone, Default)]
pub struct HashCache {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl HashCache {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember `hash` as the latest for `file_key`
    pub fn record(&self, file_key: &str, hash: &str) {
        self.lock().insert(file_key.to_string(), hash.to_string());
    }

    /// Latest hash for `file_key`
    #[must_use]
    pub fn get(&self, file_key: &str) -> Option<String> {
        self.lock().get(file_key).cloned()
    }

    /// Number of files hashed
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no file has been hashed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
