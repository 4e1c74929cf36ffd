//! covstash: coverage collection core for JavaScript-like sources
//!
//! Decides which files to instrument, caches instrumented output by content
//! hash, persists one coverage snapshot per OS process and merges every
//! snapshot of a run back into source-mapped coverage.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      COVSTASH Data Flow                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Runtime ──► SourceProvider ──► Classifier ──► TransformCache    │
//! │                                                  │ miss          │
//! │                                                  ▼               │
//! │                                             Instrumenter         │
//! │                                                                  │
//! │  instrumented code ──► CoverageAccumulator                       │
//! │                             │ ShutdownHooks (terminal phase)     │
//! │                             ▼                                    │
//! │                     <temp_dir>/<pid>.json                        │
//! │                             │                                    │
//! │                             ▼                                    │
//! │          ReportAggregator ──► SourceMapCache ──► Collector       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The instrumentation engine and the runtime that evaluates modules are
//! external; they plug in through [`Instrumenter`] and [`Runtime`].

#![warn(missing_docs)]

/// Report Aggregator: snapshot loading and remapping
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod aggregate;

/// Content-addressed transform cache
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod cache;

/// Include/exclude glob classification
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod classify;

/// Session configuration
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod config;

/// Coverage records and the per-process accumulator
pub mod coverage;

/// Instrumentation engine and runtime seams
#[allow(clippy::missing_errors_doc)]
pub mod engine;

/// Require Interceptor: the loader hook
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod interceptor;

/// Coverage Persistence
#[allow(clippy::missing_errors_doc)]
pub mod persist;

mod result;

/// Coverage session for one process
#[allow(clippy::missing_errors_doc)]
pub mod session;

/// Exit hook registry and exit-path wiring
#[allow(clippy::missing_errors_doc)]
pub mod shutdown;

/// Source map decoding, detection and remapping
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod source_map;

pub use aggregate::{Collector, MergingCollector, ReportAggregator, Reporter};
pub use cache::{content_hash, FileMeta, HashCache, Salt, TransformCache, TransformFactory};
pub use classify::{Classifier, PatternSet};
pub use config::CovConfig;
pub use coverage::{CoverageAccumulator, CoverageMap, FileCoverage, Position, Range};
pub use engine::{CommandInstrumenter, Instrumenter, Runtime};
pub use interceptor::{FileRecord, InstrumentingProvider, PreloadTarget, SourceProvider};
pub use persist::CoverageWriter;
pub use result::{CovError, CovResult};
pub use session::Session;
pub use shutdown::{install_exit_triggers, HookPhase, ShutdownGuard, ShutdownHooks};
pub use source_map::{SourceMap, SourceMapCache};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::aggregate::*;
    pub use super::cache::{FileMeta, HashCache, Salt, TransformCache, TransformFactory};
    pub use super::classify::*;
    pub use super::config::CovConfig;
    pub use super::coverage::*;
    pub use super::engine::*;
    pub use super::interceptor::*;
    pub use super::persist::*;
    pub use super::result::*;
    pub use super::session::*;
    pub use super::shutdown::*;
    pub use super::source_map::{SourceMap, SourceMapCache};
}
