//! Source map v3 decoding and position lookup

use crate::result::{CovError, CovResult};
use serde::Deserialize;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Direction to search when no mapping starts exactly at a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Closest mapping at or before the column
    GreatestLowerBound,
    /// Closest mapping at or after the column
    LeastUpperBound,
}

/// One decoded segment of the `mappings` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// Column in generated code (0-based)
    pub generated_column: u32,
    /// Index into `sources`, absent for unmapped segments
    pub source: Option<u32>,
    /// Line in original source (1-based)
    pub original_line: u32,
    /// Column in original source (0-based)
    pub original_column: u32,
    /// Index into `names`
    pub name: Option<u32>,
}

/// Result of a successful lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    /// Original source file, as listed in the map
    pub source: Option<String>,
    /// Line in original source (1-based)
    pub line: u32,
    /// Column in original source (0-based)
    pub column: u32,
    /// Original identifier, when the map names one
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    version: u32,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    source_root: Option<String>,
    mappings: String,
}

/// A parsed source map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMap {
    json: String,
    sources: Vec<Option<String>>,
    names: Vec<String>,
    /// Mappings per generated line, sorted by generated column
    lines: Vec<Vec<Mapping>>,
}

impl SourceMap {
    /// Parse a serialized v3 source map
    pub fn from_json(json: &str) -> CovResult<Self> {
        let raw: RawSourceMap = serde_json::from_str(json)?;
        if raw.version != 3 {
            return Err(CovError::source_map(format!(
                "unsupported source map version {}",
                raw.version
            )));
        }

        let root = raw
            .source_root
            .filter(|r| !r.is_empty())
            .map(|r| if r.ends_with('/') { r } else { format!("{r}/") });
        let sources = raw
            .sources
            .into_iter()
            .map(|s| match (&root, s) {
                (Some(root), Some(s)) => Some(format!("{root}{s}")),
                (_, s) => s,
            })
            .collect();

        let lines = decode_mappings(&raw.mappings)?;
        Ok(Self {
            json: json.to_string(),
            sources,
            names: raw.names,
            lines,
        })
    }

    /// Serialized form, exactly as parsed
    #[must_use]
    pub fn to_json(&self) -> &str {
        &self.json
    }

    /// Original source files
    #[must_use]
    pub fn sources(&self) -> &[Option<String>] {
        &self.sources
    }

    /// Mappings for a generated line (1-based)
    #[must_use]
    pub fn line_mappings(&self, line: u32) -> &[Mapping] {
        match line.checked_sub(1).and_then(|idx| self.lines.get(idx as usize)) {
            Some(mappings) => mappings,
            None => &[],
        }
    }

    /// Map a generated position back to original source.
    ///
    /// Only mappings on the same generated line are considered.
    #[must_use]
    pub fn original_position_for(&self, line: u32, column: u32, bias: Bias) -> Option<OriginalPosition> {
        let mappings = self.line_mappings(line);
        let found = match bias {
            Bias::GreatestLowerBound => {
                let idx = mappings.partition_point(|m| m.generated_column <= column);
                idx.checked_sub(1).map(|i| &mappings[i])
            }
            Bias::LeastUpperBound => {
                let idx = mappings.partition_point(|m| m.generated_column < column);
                mappings.get(idx)
            }
        }?;

        let source = found.source?;
        Some(OriginalPosition {
            source: self.sources.get(source as usize).cloned().flatten(),
            line: found.original_line,
            column: found.original_column,
            name: found
                .name
                .and_then(|n| self.names.get(n as usize).cloned()),
        })
    }
}

fn decode_mappings(mappings: &str) -> CovResult<Vec<Vec<Mapping>>> {
    let mut lines = Vec::new();
    // Everything except the generated column carries over between lines.
    let mut source: i64 = 0;
    let mut original_line: i64 = 0;
    let mut original_column: i64 = 0;
    let mut name: i64 = 0;

    for line in mappings.split(';') {
        let mut generated_column: i64 = 0;
        let mut decoded = Vec::new();

        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let fields = decode_vlq(segment)?;
            generated_column += fields[0];

            let mut mapping = Mapping {
                generated_column: to_u32(generated_column)?,
                source: None,
                original_line: 0,
                original_column: 0,
                name: None,
            };

            match fields.len() {
                1 => {}
                4 | 5 => {
                    source += fields[1];
                    original_line += fields[2];
                    original_column += fields[3];
                    mapping.source = Some(to_u32(source)?);
                    mapping.original_line = to_u32(original_line)? + 1;
                    mapping.original_column = to_u32(original_column)?;
                    if let Some(delta) = fields.get(4) {
                        name += delta;
                        mapping.name = Some(to_u32(name)?);
                    }
                }
                n => {
                    return Err(CovError::source_map(format!(
                        "segment '{segment}' has {n} fields"
                    )))
                }
            }
            decoded.push(mapping);
        }

        decoded.sort_by_key(|m| m.generated_column);
        lines.push(decoded);
    }
    Ok(lines)
}

/// Decode one base64 VLQ segment into its signed fields.
fn decode_vlq(segment: &str) -> CovResult<Vec<i64>> {
    let mut values = Vec::with_capacity(5);
    let mut value: i64 = 0;
    let mut shift = 0u32;

    for byte in segment.bytes() {
        let digit = BASE64_ALPHABET
            .iter()
            .position(|&c| c == byte)
            .ok_or_else(|| CovError::source_map(format!("invalid base64 digit '{}'", byte as char)))?
            as i64;

        value += (digit & 0b1_1111) << shift;
        if digit & 0b10_0000 == 0 {
            let magnitude = value >> 1;
            values.push(if value & 1 == 1 { -magnitude } else { magnitude });
            value = 0;
            shift = 0;
        } else {
            shift += 5;
            if shift > 60 {
                return Err(CovError::source_map("VLQ value overflows 64 bits"));
            }
        }
    }

    if shift != 0 {
        return Err(CovError::source_map(format!(
            "truncated VLQ segment '{segment}'"
        )));
    }
    Ok(values)
}

fn to_u32(value: i64) -> CovResult<u32> {
    u32::try_from(value)
        .map_err(|_| CovError::source_map(format!("mapping field out of range: {value}")))
}
