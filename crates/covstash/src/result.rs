//! Result and error types for Covstash.

use thiserror::Error;

/// Result type for Covstash operations
pub type CovResult<T> = Result<T, CovError>;

/// Errors that can occur in Covstash
#[derive(Debug, Error)]
pub enum CovError {
    /// A configured include/exclude glob could not be compiled
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Pattern as written in the configuration
        pattern: String,
        /// Error message
        message: String,
    },

    /// The instrumentation engine failed on a file
    #[error("Instrumentation of {file} failed: {message}")]
    Engine {
        /// File key of the file being instrumented
        file: String,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Source map could not be decoded
    #[error("Source map error: {message}")]
    SourceMap {
        /// Error message
        message: String,
    },

    /// The execution environment rejected a module
    #[error("Runtime error in {module}: {message}")]
    Runtime {
        /// Module being evaluated or preloaded
        module: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl CovError {
    /// Create an engine error
    #[must_use]
    pub fn engine(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a source map error
    #[must_use]
    pub fn source_map(message: impl Into<String>) -> Self {
        Self::SourceMap {
            message: message.into(),
        }
    }

    /// Create a runtime error
    #[must_use]
    pub fn runtime(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runtime {
            module: module.into(),
            message: message.into(),
        }
    }
}
