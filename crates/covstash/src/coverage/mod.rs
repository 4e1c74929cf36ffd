//! Coverage data model and the per-process accumulator.

mod accumulator;
mod model;

pub use accumulator::CoverageAccumulator;
pub use model::{BranchMeta, CoverageMap, FileCoverage, FunctionMeta, Position, Range};
