//! Include/exclude file classification.
//!
//! Patterns use a micromatch-compatible subset: `*` and `?` stop at `/`,
//! `**` spans directories, `[...]` classes, and `{a,b}` alternatives.
//! Any pattern not ending in `/**` also excludes everything below it, the
//! way a directory entry does in `.gitignore`.

use crate::config::{CovConfig, DEPENDENCY_EXCLUDE};
use crate::result::{CovError, CovResult};
use glob::{MatchOptions, Pattern};
use std::path::Path;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Ordered, deduplicated and compiled set of glob patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    compiled: Vec<Pattern>,
}

impl PatternSet {
    /// Expand and compile `patterns`.
    pub fn new<I, S>(patterns: I) -> CovResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = expand_patterns(patterns);
        let mut compiled = Vec::new();
        for pattern in &patterns {
            for alternative in expand_braces(pattern) {
                let glob = Pattern::new(&alternative).map_err(|e| CovError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.msg.to_string(),
                })?;
                compiled.push(glob);
            }
        }
        Ok(Self { patterns, compiled })
    }

    /// Expanded patterns in evaluation order
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether the set holds no patterns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether any pattern matches `path`
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.compiled
            .iter()
            .any(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}

/// Add a `<dir>/**` sibling before every pattern not already recursive.
///
/// Duplicates are dropped, keeping first occurrence.
pub fn expand_patterns<I, S>(patterns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result: Vec<String> = Vec::new();
    let mut add = |p: String| {
        if !result.contains(&p) {
            result.push(p);
        }
    };

    for pattern in patterns {
        let pattern = pattern.as_ref();
        if !pattern.ends_with("/**") {
            let dir = pattern.strip_suffix('/').unwrap_or(pattern);
            add(format!("{dir}/**"));
        }
        add(pattern.to_string());
    }
    result
}

/// Expand `{a,b}` alternatives, which `glob::Pattern` treats literally.
///
/// Groups without a top-level comma, or unbalanced braces, stay literal.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = find_brace_group(pattern) else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    split_top_level(body)
        .into_iter()
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}

/// First balanced `{...}` group containing a top-level comma.
fn find_brace_group(pattern: &str) -> Option<(usize, usize)> {
    let bytes = pattern.as_bytes();
    let mut start = 0;
    while let Some(rel) = pattern[start..].find('{') {
        let open = start + rel;
        let mut depth = 0usize;
        let mut has_comma = false;
        for (i, &b) in bytes.iter().enumerate().skip(open) {
            match b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        if has_comma {
                            return Some((open, i));
                        }
                        break;
                    }
                }
                b',' if depth == 1 => has_comma = true,
                _ => {}
            }
        }
        start = open + 1;
    }
    None
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[last..]);
    parts
}

/// Decides whether a candidate file participates in coverage
#[derive(Debug, Clone)]
pub struct Classifier {
    include: Option<PatternSet>,
    exclude: PatternSet,
}

impl Classifier {
    /// Build from raw include/exclude lists; the dependency exclusion is
    /// always prepended to `exclude`.
    pub fn new(include: Option<&[String]>, exclude: &[String]) -> CovResult<Self> {
        let include = include.map(|p| PatternSet::new(p)).transpose()?;
        let exclude = PatternSet::new(
            std::iter::once(DEPENDENCY_EXCLUDE).chain(exclude.iter().map(String::as_str)),
        )?;
        Ok(Self { include, exclude })
    }

    /// Build from a session configuration
    pub fn from_config(config: &CovConfig) -> CovResult<Self> {
        Self::new(config.include.as_deref(), &config.exclude_patterns())
    }

    /// Include set, when one is configured
    #[must_use]
    pub fn include(&self) -> Option<&PatternSet> {
        self.include.as_ref()
    }

    /// Exclude set, including the dependency rule
    #[must_use]
    pub fn exclude(&self) -> &PatternSet {
        &self.exclude
    }

    /// Whether either form of the path is excluded
    #[must_use]
    pub fn is_excluded(&self, absolute: &Path, relative: &str) -> bool {
        let relative = strip_dot_slash(relative);
        self.exclude.matches(&absolute.to_string_lossy()) || self.exclude.matches(relative)
    }

    /// Total yes/no decision for one file
    #[must_use]
    pub fn should_instrument(&self, absolute: &Path, relative: &str) -> bool {
        let relative = strip_dot_slash(relative);
        let included = self.include.as_ref().map_or(true, |set| {
            set.matches(&absolute.to_string_lossy()) || set.matches(relative)
        });
        let decision = included && !self.is_excluded(absolute, relative);
        tracing::trace!(file = relative, decision, "classified");
        decision
    }
}

fn strip_dot_slash(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    mod expansion_tests {
        use super::*;

        #[test]
        fn test_directory_gets_recursive_sibling() {
            assert_eq!(expand_patterns(["lib"]), strings(&["lib/**", "lib"]));
        }

        #[test]
        fn test_trailing_slash_removed_from_sibling() {
            assert_eq!(expand_patterns(["lib/"]), strings(&["lib/**", "lib/"]));
        }

        #[test]
        fn test_recursive_pattern_left_alone() {
            assert_eq!(expand_patterns(["test/**"]), strings(&["test/**"]));
        }

        #[test]
        fn test_duplicates_dropped() {
            assert_eq!(
                expand_patterns(["lib", "lib/**", "lib"]),
                strings(&["lib/**", "lib"])
            );
        }

        #[test]
        fn test_brace_empty_alternative() {
            assert_eq!(
                expand_braces("test{,-*}.js"),
                strings(&["test.js", "test-*.js"])
            );
        }

        #[test]
        fn test_brace_multiple_groups() {
            assert_eq!(
                expand_braces("{a,b}/{c,d}"),
                strings(&["a/c", "a/d", "b/c", "b/d"])
            );
        }

        #[test]
        fn test_brace_nested() {
            assert_eq!(expand_braces("x{a,b{1,2}}"), strings(&["xa", "xb1", "xb2"]));
        }

        #[test]
        fn test_brace_without_comma_is_literal() {
            assert_eq!(expand_braces("a{b}c"), strings(&["a{b}c"]));
            assert_eq!(expand_braces("a{b,c"), strings(&["a{b,c"]));
        }
    }

    mod pattern_set_tests {
        use super::*;

        #[test]
        fn test_star_does_not_cross_directories() {
            let set = PatternSet::new(["*.js/**", "*.js"]).unwrap();
            assert!(set.matches("index.js"));
            assert!(!set.matches("lib/index.js"));
        }

        #[test]
        fn test_directory_shorthand_matches_contents() {
            let set = PatternSet::new(["fixtures"]).unwrap();
            assert!(set.matches("fixtures/a.js"));
            assert!(set.matches("fixtures/deep/b.js"));
            assert!(!set.matches("lib/fixtures.js"));
        }

        #[test]
        fn test_invalid_pattern_is_error() {
            let err = PatternSet::new(["lib/[z-a"]).unwrap_err();
            assert!(matches!(err, CovError::InvalidPattern { .. }));
        }

        #[test]
        fn test_default_test_file_conventions() {
            let set = PatternSet::new(["test/**", "test{,-*}.js"]).unwrap();
            assert!(set.matches("test.js"));
            assert!(set.matches("test-utils.js"));
            assert!(set.matches("test/unit/a.js"));
            assert!(!set.matches("lib/test.js"));
            assert!(!set.matches("testing.js"));
        }
    }

    mod classifier_tests {
        use super::*;

        #[test]
        fn test_exclude_test_dir_without_include() {
            let classifier = Classifier::new(None, &strings(&["test/**"])).unwrap();
            assert!(!classifier.should_instrument(Path::new("/proj/test/foo.js"), "test/foo.js"));
            assert!(classifier.should_instrument(Path::new("/proj/lib/foo.js"), "lib/foo.js"));
        }

        #[test]
        fn test_dependency_dir_always_excluded() {
            let classifier = Classifier::new(None, &[]).unwrap();
            assert!(!classifier.should_instrument(
                Path::new("/proj/node_modules/dep/index.js"),
                "node_modules/dep/index.js"
            ));
            assert!(!classifier.should_instrument(
                Path::new("/proj/lib/node_modules/dep/index.js"),
                "lib/node_modules/dep/index.js"
            ));
        }

        #[test]
        fn test_include_limits_candidates() {
            let classifier =
                Classifier::new(Some(&strings(&["lib/**"])), &strings(&["test/**"])).unwrap();
            assert!(classifier.should_instrument(Path::new("/proj/lib/a.js"), "lib/a.js"));
            assert!(!classifier.should_instrument(Path::new("/proj/bin/a.js"), "bin/a.js"));
        }

        #[test]
        fn test_include_matches_absolute_form() {
            let classifier =
                Classifier::new(Some(&strings(&["/proj/src/**"])), &[]).unwrap();
            assert!(classifier.should_instrument(Path::new("/proj/src/a.js"), "src/a.js"));
        }

        #[test]
        fn test_exclude_matches_absolute_form() {
            let classifier = Classifier::new(None, &strings(&["/proj/generated/**"])).unwrap();
            assert!(!classifier.should_instrument(
                Path::new("/proj/generated/a.js"),
                "generated/a.js"
            ));
        }

        #[test]
        fn test_empty_include_matches_nothing() {
            let classifier = Classifier::new(Some(&[]), &[]).unwrap();
            assert!(!classifier.should_instrument(Path::new("/proj/lib/a.js"), "lib/a.js"));
        }

        #[test]
        fn test_leading_dot_slash_is_stripped() {
            let classifier = Classifier::new(None, &strings(&["test/**"])).unwrap();
            assert!(!classifier.should_instrument(Path::new("/proj/test/a.js"), "./test/a.js"));
        }

        #[test]
        fn test_exclude_wins_over_include() {
            let classifier =
                Classifier::new(Some(&strings(&["lib/**"])), &strings(&["lib/vendor"])).unwrap();
            assert!(!classifier.should_instrument(
                Path::new("/proj/lib/vendor/x.js"),
                "lib/vendor/x.js"
            ));
            assert!(classifier.should_instrument(Path::new("/proj/lib/x.js"), "lib/x.js"));
        }

        #[test]
        fn test_from_config_uses_defaults() {
            let classifier = Classifier::from_config(&CovConfig::new()).unwrap();
            assert_eq!(
                classifier.exclude().patterns()[0],
                DEPENDENCY_EXCLUDE.to_string()
            );
            assert!(!classifier.should_instrument(Path::new("/p/test-a.js"), "test-a.js"));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_expansion_adds_recursive_sibling(p in "[a-z]{1,8}(/[a-z]{1,8}){0,3}") {
                let expanded = expand_patterns([p.as_str()]);
                prop_assert!(expanded.contains(&p));
                let sibling = format!("{p}/**");
                prop_assert!(expanded.contains(&sibling));
            }

            #[test]
            fn prop_classification_is_deterministic(
                dir in "[a-z]{1,6}",
                file in "[a-z]{1,6}",
                exclude in "[a-z]{1,6}",
            ) {
                let classifier = Classifier::new(None, &[exclude]).unwrap();
                let rel = format!("{dir}/{file}.js");
                let abs = format!("/root/{rel}");
                let first = classifier.should_instrument(Path::new(&abs), &rel);
                let second = classifier.should_instrument(Path::new(&abs), &rel);
                prop_assert_eq!(first, second);
            }
        }
    }
}
