//! Location rewriting for one file's coverage record

use super::{Bias, SourceMap};
use crate::coverage::{FileCoverage, Position, Range};

/// Rewrite statement, function and branch locations of `file` through `map`.
///
/// A range moves only when both ends resolve; otherwise it keeps its
/// generated coordinates.
pub fn remap_file(file: &mut FileCoverage, map: &SourceMap) {
    for range in file.statement_map.values_mut() {
        if let Some(mapped) = remap_range(range, map) {
            *range = mapped;
        }
    }

    for meta in file.fn_map.values_mut() {
        if let Some(mapped) = remap_range(&meta.loc, map) {
            meta.line = mapped.start.line;
            meta.loc = mapped;
        }
    }

    for meta in file.branch_map.values_mut() {
        let mut first_line = None;
        for location in &mut meta.locations {
            if let Some(mapped) = remap_range(location, map) {
                first_line.get_or_insert(mapped.start.line);
                *location = mapped;
            }
        }
        if let Some(line) = first_line {
            meta.line = line;
        }
    }
}

fn remap_range(range: &Range, map: &SourceMap) -> Option<Range> {
    let start = map.original_position_for(range.start.line, range.start.column, Bias::LeastUpperBound)?;
    let end = map.original_position_for(range.end.line, range.end.column, Bias::GreatestLowerBound)?;
    Some(Range {
        start: Position::new(start.line, start.column),
        end: Position::new(end.line, end.column),
        skip: range.skip,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Line 1: col 0 → 10:0, col 8 → 10:5.
    /// Line 2: col 4 → 12:0, col 12 → 12:7.
    const MAP: &str = r#"{"version":3,"sources":["src/a.ts"],"names":[],"mappings":"AASA,QAAK;IAEL,QAAO"}"#;

    fn range(l1: u32, c1: u32, l2: u32, c2: u32) -> Range {
        Range::new(Position::new(l1, c1), Position::new(l2, c2))
    }

    #[test]
    fn test_statement_remapped() {
        let map = SourceMap::from_json(MAP).unwrap();
        let mut file = FileCoverage::new("a.js").with_statement("0", range(1, 0, 1, 8));
        remap_file(&mut file, &map);
        assert_eq!(file.statement_map["0"], range(10, 0, 10, 5));
    }

    #[test]
    fn test_unresolvable_statement_kept() {
        let map = SourceMap::from_json(MAP).unwrap();
        let mut file = FileCoverage::new("a.js").with_statement("0", range(3, 0, 3, 4));
        remap_file(&mut file, &map);
        assert_eq!(file.statement_map["0"], range(3, 0, 3, 4));
    }

    #[test]
    fn test_function_line_follows_loc() {
        let map = SourceMap::from_json(MAP).unwrap();
        let mut file = FileCoverage::new("a.js").with_function("0", "go", range(2, 4, 2, 12));
        remap_file(&mut file, &map);
        let meta = &file.fn_map["0"];
        assert_eq!(meta.loc, range(12, 0, 12, 7));
        assert_eq!(meta.line, 12);
    }

    #[test]
    fn test_branch_locations_remapped() {
        let map = SourceMap::from_json(MAP).unwrap();
        let mut file = FileCoverage::new("a.js")
            .with_branch("0", "if", vec![range(1, 0, 1, 8), range(2, 4, 2, 12)]);
        remap_file(&mut file, &map);
        let meta = &file.branch_map["0"];
        assert_eq!(meta.line, 10);
        assert_eq!(meta.locations[1], range(12, 0, 12, 7));
        assert_eq!(file.b["0"], vec![0, 0]);
    }

    #[test]
    fn test_hit_counts_untouched() {
        let map = SourceMap::from_json(MAP).unwrap();
        let mut file = FileCoverage::new("a.js").with_statement("0", range(1, 0, 1, 8));
        file.s.insert("0".into(), 7);
        remap_file(&mut file, &map);
        assert_eq!(file.s["0"], 7);
    }
}
