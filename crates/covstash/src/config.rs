//! Coverage run configuration.
//!
//! Values come from three layers, later ones winning:
//! defaults, the optional `.covstash.yml` in the working directory, and the
//! `COVSTASH_*` environment variables set by a parent `covstash run`.

use crate::result::CovResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional configuration file in the working directory
pub const CONFIG_FILE: &str = ".covstash.yml";

/// Environment variable carrying the working directory to subprocesses
pub const ENV_CWD: &str = "COVSTASH_CWD";

/// Environment variable that enables the disk cache when set to `enable`
pub const ENV_CACHE: &str = "COVSTASH_CACHE";

/// Exclusion applied to every run regardless of configuration
pub const DEPENDENCY_EXCLUDE: &str = "**/node_modules/**";

/// Exclusions used when the configuration names none
pub const DEFAULT_EXCLUDE: &[&str] = &["test/**", "test{,-*}.js"];

/// Configuration for a coverage session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CovConfig {
    /// Root against which every relative path is computed
    #[serde(skip)]
    pub cwd: PathBuf,
    /// Shared directory holding one snapshot per process
    pub temp_directory: PathBuf,
    /// Root of the content-addressed transform cache
    pub cache_directory: PathBuf,
    /// Whether instrumented output is cached on disk
    pub enable_cache: bool,
    /// Include patterns; `None` means every file is a candidate
    pub include: Option<Vec<String>>,
    /// Exclude patterns; `None` means [`DEFAULT_EXCLUDE`]
    pub exclude: Option<Vec<String>>,
    /// Modules to preload before interception begins
    pub require: Vec<String>,
    /// Reporter names handed to the external reporter
    pub reporter: Vec<String>,
    /// Set when this process was spawned by a parent coverage run
    #[serde(skip)]
    pub subprocess: bool,
}

impl Default for CovConfig {
    fn default() -> Self {
        Self {
            cwd: PathBuf::from("."),
            temp_directory: PathBuf::from(".covstash_output"),
            cache_directory: PathBuf::from("node_modules/.cache/covstash"),
            enable_cache: false,
            include: None,
            exclude: None,
            require: Vec::new(),
            reporter: vec!["text".to_string()],
            subprocess: false,
        }
    }
}

impl CovConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration for `cwd` from the process environment and the
    /// config file of the effective root.
    pub fn load(cwd: &Path) -> CovResult<Self> {
        Self::load_with(cwd, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load), reading variables through `lookup`.
    ///
    /// `COVSTASH_CWD` replaces `cwd` before the config file is read, so a
    /// subprocess started in a subdirectory uses its parent run's settings.
    pub fn load_with<F>(cwd: &Path, lookup: F) -> CovResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = lookup(ENV_CWD)
            .filter(|v| !v.is_empty())
            .map_or_else(|| cwd.to_path_buf(), PathBuf::from);
        let mut config = Self::from_file(&root.join(CONFIG_FILE))?.unwrap_or_default();
        config.cwd = root;
        config.apply_env(lookup);
        Ok(config)
    }

    /// Read a YAML config file; `Ok(None)` when it does not exist.
    pub fn from_file(path: &Path) -> CovResult<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let yaml = fs::read_to_string(path)?;
        let config: Self = serde_yaml_ng::from_str(&yaml)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(Some(config))
    }

    /// Apply `COVSTASH_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(cwd) = lookup(ENV_CWD).filter(|v| !v.is_empty()) {
            self.cwd = PathBuf::from(cwd);
            self.subprocess = true;
        }
        if lookup(ENV_CACHE).as_deref() == Some("enable") {
            self.enable_cache = true;
        }
    }

    /// Set the working directory
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Set the snapshot directory
    #[must_use]
    pub fn with_temp_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_directory = dir.into();
        self
    }

    /// Set the cache directory
    #[must_use]
    pub fn with_cache_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    /// Enable or disable the disk cache
    #[must_use]
    pub const fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    /// Set include patterns
    #[must_use]
    pub fn with_include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Set exclude patterns (the dependency exclusion is always added)
    #[must_use]
    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Set preload modules
    #[must_use]
    pub fn with_require<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Set reporter names
    #[must_use]
    pub fn with_reporters<I, S>(mut self, reporters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reporter = reporters.into_iter().map(Into::into).collect();
        self
    }

    /// Absolute-or-cwd-relative snapshot directory
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.cwd.join(&self.temp_directory)
    }

    /// Absolute-or-cwd-relative cache directory
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cwd.join(&self.cache_directory)
    }

    /// Exclude patterns as configured, before the dependency rule is added
    #[must_use]
    pub fn exclude_patterns(&self) -> Vec<String> {
        self.exclude.clone().unwrap_or_else(|| {
            DEFAULT_EXCLUDE
                .iter()
                .map(|p| (*p).to_string())
                .collect()
        })
    }
}
