//! Source map discovery in loaded source text.
//!
//! Two forms are recognized: an inline base64 `data:` URI in a
//! `sourceMappingURL` comment, and a comment naming a map file next to the
//! source. A source with neither simply has no map.

use super::SourceMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

const INLINE_PATTERN: &str = r"(?m)^\s*/(?:/|\*)[@#]\s+sourceMappingURL=data:(?:application|text)/json;(?:charset[:=][^;\s]+;)?base64,([A-Za-z0-9+/=]+)";

const MAP_FILE_PATTERN: &str = r#"(?m)(?://[@#][ \t]+sourceMappingURL=([^\s'"`]+?)[ \t]*$)|(?:/\*[@#][ \t]+sourceMappingURL=([^*]+?)[ \t]*\*/[ \t]*$)"#;

#[allow(clippy::expect_used)]
fn inline_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(INLINE_PATTERN).expect("inline source map pattern compiles"))
}

#[allow(clippy::expect_used)]
fn map_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MAP_FILE_PATTERN).expect("map file pattern compiles"))
}

/// Find the source map for `source`, loaded from `source_path`.
///
/// Inline maps win over map-file comments. Unreadable or malformed maps are
/// logged and treated as absent.
pub fn detect(source: &str, source_path: &Path) -> Option<SourceMap> {
    from_inline(source).or_else(|| from_map_file(source, source_path))
}

fn from_inline(source: &str) -> Option<SourceMap> {
    let payload = inline_regex()
        .captures_iter(source)
        .last()?
        .get(1)?
        .as_str();

    let bytes = match STANDARD.decode(payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "inline source map is not valid base64");
            return None;
        }
    };
    let json = String::from_utf8_lossy(&bytes);
    parse_logged(&json, "inline")
}

fn from_map_file(source: &str, source_path: &Path) -> Option<SourceMap> {
    let caps = map_file_regex().captures_iter(source).last()?;
    let url = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
    if url.starts_with("data:") {
        return None;
    }

    let dir = source_path.parent().unwrap_or_else(|| Path::new("."));
    let map_path = dir.join(url);
    match fs::read_to_string(&map_path) {
        Ok(json) => parse_logged(&json, &map_path.display().to_string()),
        Err(e) => {
            tracing::warn!(path = %map_path.display(), error = %e, "referenced source map not readable");
            None
        }
    }
}

fn parse_logged(json: &str, origin: &str) -> Option<SourceMap> {
    match SourceMap::from_json(json) {
        Ok(map) => Some(map),
        Err(e) => {
            tracing::warn!(origin, error = %e, "ignoring malformed source map");
            None
        }
    }
}
