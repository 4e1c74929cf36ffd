//! Per-file coverage records
//!
//! The JSON shape matches what istanbul-style instrumenters accumulate at
//! runtime (`s`, `b`, `f` counters plus location maps), so snapshots can be
//! handed to existing collectors unchanged. Fields this crate does not
//! interpret are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Coverage for every file seen by one process, keyed by file key
pub type CoverageMap = BTreeMap<String, FileCoverage>;

/// A point in source text (1-based line, 0-based column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Line number, starting at 1
    pub line: u32,
    /// Column number, starting at 0
    pub column: u32,
}

impl Position {
    /// Create a new position
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A span of source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// First position covered
    pub start: Position,
    /// Last position covered
    pub end: Position,
    /// Set by instrumenters for ignored code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<bool>,
}

impl Range {
    /// Create a range between two positions
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self {
            start,
            end,
            skip: None,
        }
    }
}

/// Function declaration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMeta {
    /// Function name (instrumenters synthesize one for anonymous functions)
    pub name: String,
    /// Line of the declaration
    pub line: u32,
    /// Span of the function body
    pub loc: Range,
    /// Unrecognized fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Branch point metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchMeta {
    /// Line of the branch point
    pub line: u32,
    /// Branch kind (`if`, `cond-expr`, `switch`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// One span per arm
    pub locations: Vec<Range>,
    /// Unrecognized fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Coverage record for one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    /// Path the instrumenter recorded for this file
    #[serde(default)]
    pub path: String,
    /// Statement hit counts
    #[serde(default)]
    pub s: BTreeMap<String, u64>,
    /// Branch hit counts, one per arm
    #[serde(default)]
    pub b: BTreeMap<String, Vec<u64>>,
    /// Function hit counts
    #[serde(default)]
    pub f: BTreeMap<String, u64>,
    /// Statement locations
    #[serde(default)]
    pub statement_map: BTreeMap<String, Range>,
    /// Function locations
    #[serde(default)]
    pub fn_map: BTreeMap<String, FunctionMeta>,
    /// Branch locations
    #[serde(default)]
    pub branch_map: BTreeMap<String, BranchMeta>,
    /// Hash of the source this file was instrumented from (cache mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Unrecognized fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileCoverage {
    /// Create an empty record for `path`
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Declare a statement with zero hits
    #[must_use]
    pub fn with_statement(mut self, id: &str, range: Range) -> Self {
        self.statement_map.insert(id.to_string(), range);
        self.s.insert(id.to_string(), 0);
        self
    }

    /// Declare a function with zero hits
    #[must_use]
    pub fn with_function(mut self, id: &str, name: &str, loc: Range) -> Self {
        let meta = FunctionMeta {
            name: name.to_string(),
            line: loc.start.line,
            loc,
            extra: Map::new(),
        };
        self.fn_map.insert(id.to_string(), meta);
        self.f.insert(id.to_string(), 0);
        self
    }

    /// Declare a branch point with zero hits on every arm
    #[must_use]
    pub fn with_branch(mut self, id: &str, kind: &str, locations: Vec<Range>) -> Self {
        let line = locations.first().map_or(0, |r| r.start.line);
        self.b.insert(id.to_string(), vec![0; locations.len()]);
        self.branch_map.insert(
            id.to_string(),
            BranchMeta {
                line,
                kind: kind.to_string(),
                locations,
                extra: Map::new(),
            },
        );
        self
    }

    /// Add another record's hit counts to this one.
    ///
    /// Location maps are unioned; counters are summed.
    pub fn merge(&mut self, other: &Self) {
        for (id, hits) in &other.s {
            *self.s.entry(id.clone()).or_insert(0) += hits;
        }
        for (id, hits) in &other.f {
            *self.f.entry(id.clone()).or_insert(0) += hits;
        }
        for (id, arms) in &other.b {
            let mine = self.b.entry(id.clone()).or_default();
            if mine.len() < arms.len() {
                mine.resize(arms.len(), 0);
            }
            for (slot, hits) in mine.iter_mut().zip(arms) {
                *slot += hits;
            }
        }
        for (id, range) in &other.statement_map {
            self.statement_map
                .entry(id.clone())
                .or_insert_with(|| range.clone());
        }
        for (id, meta) in &other.fn_map {
            self.fn_map.entry(id.clone()).or_insert_with(|| meta.clone());
        }
        for (id, meta) in &other.branch_map {
            self.branch_map
                .entry(id.clone())
                .or_insert_with(|| meta.clone());
        }
    }
}
