//! Require Interceptor
//!
//! The execution environment asks a [`SourceProvider`] for the code to run
//! before it evaluates any module. [`InstrumentingProvider`] answers with
//! instrumented code for files the classifier accepts, and the untouched
//! source for everything else.

use crate::cache::{FileMeta, TransformCache};
use crate::classify::Classifier;
use crate::result::CovResult;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// One file as seen by the loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// File key relative to the working directory
    pub relative_path: String,
    /// Source as read
    pub raw_source: String,
    /// Whether `content` is instrumented output
    pub instrumented: bool,
    /// Code to evaluate
    pub content: String,
}

/// Loader hook consulted before any module is evaluated
pub trait SourceProvider: Send + Sync {
    /// Return the record whose `content` the runtime should evaluate for `path`.
    ///
    /// An error means the module must not run.
    fn provide(&self, path: &Path, source: String) -> CovResult<FileRecord>;
}

/// Classifier plus transform cache
#[derive(Debug, Clone)]
pub struct InstrumentingProvider {
    cwd: PathBuf,
    classifier: Arc<Classifier>,
    transform: Arc<TransformCache>,
}

impl InstrumentingProvider {
    /// Provider resolving file keys against `cwd`
    #[must_use]
    pub fn new(
        cwd: impl Into<PathBuf>,
        classifier: Arc<Classifier>,
        transform: Arc<TransformCache>,
    ) -> Self {
        Self {
            cwd: cwd.into(),
            classifier,
            transform,
        }
    }

    /// Working directory that file keys are relative to
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Instrumented code for `path`, or `None` when the file is not covered
    pub fn maybe_instrument(
        &self,
        source: &str,
        path: &Path,
        relative: &str,
    ) -> CovResult<Option<String>> {
        if !self.classifier.should_instrument(path, relative) {
            return Ok(None);
        }
        let meta = FileMeta::new(path, relative);
        self.transform.transform(source, &meta).map(Some)
    }
}

impl SourceProvider for InstrumentingProvider {
    fn provide(&self, path: &Path, source: String) -> CovResult<FileRecord> {
        let absolute_path = absolutize(&self.cwd, path);
        let relative_path = relative_path(&self.cwd, &absolute_path);
        let instrumented = self.maybe_instrument(&source, &absolute_path, &relative_path)?;

        Ok(match instrumented {
            Some(content) => FileRecord {
                absolute_path,
                relative_path,
                raw_source: source,
                instrumented: true,
                content,
            },
            None => FileRecord {
                absolute_path,
                relative_path,
                content: source.clone(),
                raw_source: source,
                instrumented: false,
            },
        })
    }
}

/// Join relative paths onto `cwd`
#[must_use]
pub fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// File key for `path`: relative to `cwd`, forward slashes, `..` where the
/// file lies outside the working directory.
#[must_use]
pub fn relative_path(cwd: &Path, path: &Path) -> String {
    let base = normalize(cwd);
    let target = normalize(&absolutize(cwd, path));

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat("..".to_string()).take(base.len() - common));
    parts.extend(target[common..].iter().cloned());
    parts.join("/")
}

/// Lexical normalization into path segments
fn normalize(path: &Path) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => parts.push(p.as_os_str().to_string_lossy().into_owned()),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
        }
    }
    parts
}

/// Drop a leading UTF-8 byte order mark
#[must_use]
pub fn strip_bom(source: &str) -> &str {
    source.strip_prefix('\u{feff}').unwrap_or(source)
}

/// A module named in the `require` list, after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadTarget {
    /// Found relative to the working directory
    Resolved(PathBuf),
    /// Not found locally; the runtime resolves the name itself
    Bare(String),
}

impl std::fmt::Display for PreloadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved(path) => write!(f, "{}", path.display()),
            Self::Bare(name) => f.write_str(name),
        }
    }
}

/// Resolve `name` against `cwd` the way a module loader would: the path
/// itself, with a `.js` suffix, as a directory index, then under
/// `node_modules`.
#[must_use]
pub fn resolve_preload(cwd: &Path, name: &str) -> PreloadTarget {
    let local = cwd.join(name);
    let candidates = [
        local.clone(),
        local.with_extension("js"),
        local.join("index.js"),
        cwd.join("node_modules").join(name).join("index.js"),
    ];
    candidates
        .into_iter()
        .find(|p| p.is_file())
        .map_or_else(|| PreloadTarget::Bare(name.to_string()), PreloadTarget::Resolved)
}
