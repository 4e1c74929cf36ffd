//! Source Map Layer
//!
//! Keeps reported locations pointing at original source. Two lifecycles:
//!
//! ```text
//! cache off:  detect map ──► SourceMapCache (by file key) ──► remap at flush
//! cache on:   detect map ──► <cache_dir>/<hash>.map ──► resolve_hash at report
//! ```
//!
//! The second path survives process boundaries: the process that reports
//! need not be the one that instrumented.

mod detect;
mod map;
mod remap;
mod store;

pub use detect::detect;
pub use map::{Bias, Mapping, OriginalPosition, SourceMap};
pub use remap::remap_file;
pub use store::SourceMapCache;
