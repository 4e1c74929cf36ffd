//! Seams to the external instrumentation engine and execution environment.
//!
//! Neither is implemented here: the engine rewrites source so that running
//! it updates coverage counters, and the runtime evaluates modules. The
//! session only needs the narrow contracts below.

use crate::coverage::CoverageAccumulator;
use crate::interceptor::{PreloadTarget, SourceProvider};
use crate::result::{CovError, CovResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

/// The AST instrumentation engine
///
/// Must be deterministic: identical `(source, file_key)` yields identical
/// output, or the content-addressed cache would serve stale code.
pub trait Instrumenter: Send + Sync {
    /// Rewrite `source` so that executing it records coverage for `file_key`
    fn instrument(&self, source: &str, file_key: &str) -> CovResult<String>;

    /// Loader shim for evaluating instrumented output outside the normal
    /// module system (bulk pre-registration of zero counts).
    fn preamble(&self, instrumented: &str, file_key: &str) -> String {
        let _ = file_key;
        instrumented.to_string()
    }

    /// Engine version, folded into every content hash
    fn version(&self) -> String;
}

/// The execution environment that evaluates modules
pub trait Runtime {
    /// Route every subsequent module load through `provider`
    fn install(&mut self, provider: Arc<dyn SourceProvider>);

    /// Evaluate `code` as the module at `path`
    fn evaluate(&mut self, code: &str, path: &Path, coverage: &CoverageAccumulator)
        -> CovResult<()>;

    /// Load a module before interception begins
    fn preload(&mut self, module: &PreloadTarget) -> CovResult<()>;
}

/// Engine driven through an external program.
///
/// The program receives the source on stdin and the file key as its last
/// argument, and prints instrumented source on stdout.
#[derive(Debug, Clone)]
pub struct CommandInstrumenter {
    program: PathBuf,
    args: Vec<String>,
    version: String,
}

impl CommandInstrumenter {
    /// Create an instrumenter running `program` with `args`
    #[must_use]
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let command_line = std::iter::once(program.display().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        let version = format!("{command_line}#{}", fingerprint(&program, &args));
        Self {
            program,
            args,
            version,
        }
    }

    /// Split a whitespace-separated command line
    pub fn parse(command_line: &str) -> CovResult<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| CovError::config("instrumenter command is empty"))?;
        Ok(Self::new(program, parts))
    }

    /// Override the version string.
    ///
    /// Defaults to the command line plus a fingerprint of the program
    /// (size and modification time) and of every argument naming a file
    /// (its contents), so replacing the engine changes the cache salt.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Short digest identifying the engine's files as they are right now
fn fingerprint(program: &Path, args: &[String]) -> String {
    let mut hasher = Sha256::new();
    if let Some(path) = resolve_program(program) {
        match fs::metadata(&path) {
            Ok(meta) => {
                hasher.update(path.display().to_string().as_bytes());
                hasher.update(meta.len().to_le_bytes());
                if let Ok(modified) = meta.modified() {
                    let since = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
                    hasher.update(since.as_nanos().to_le_bytes());
                }
            }
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "cannot stat instrumenter"),
        }
    }
    for arg in args {
        let path = Path::new(arg);
        if !path.is_file() {
            continue;
        }
        match fs::read(path) {
            Ok(bytes) => {
                hasher.update(arg.as_bytes());
                hasher.update((bytes.len() as u64).to_le_bytes());
                hasher.update(&bytes);
            }
            Err(e) => tracing::debug!(path = arg, error = %e, "cannot read instrumenter file"),
        }
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// `program` as given when it names a file, else the first match on `PATH`
fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.is_file() {
        return Some(program.to_path_buf());
    }
    if program.components().count() > 1 {
        return None;
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

impl Instrumenter for CommandInstrumenter {
    fn instrument(&self, source: &str, file_key: &str) -> CovResult<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(file_key)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CovError::engine(file_key, format!("cannot start {}: {e}", self.program.display()))
            })?;

        // Feed stdin from another thread so a large output cannot deadlock us.
        let writer = child.stdin.take().map(|mut stdin| {
            let source = source.to_string();
            std::thread::spawn(move || stdin.write_all(source.as_bytes()))
        });

        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.join() {
                tracing::debug!(error = %e, "instrumenter closed stdin early");
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CovError::engine(
                file_key,
                format!("{} exited with {}: {}", self.program.display(), output.status, stderr.trim()),
            ));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| CovError::engine(file_key, format!("output is not UTF-8: {e}")))
    }

    fn version(&self) -> String {
        self.version.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_arguments() {
        let engine = CommandInstrumenter::parse("node instrument.js --compact").unwrap();
        assert!(engine.version().starts_with("node instrument.js --compact#"));
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(
            CommandInstrumenter::parse("   "),
            Err(CovError::Config { .. })
        ));
    }

    #[test]
    fn test_version_override() {
        let engine = CommandInstrumenter::new("inst", ["-x"]).with_version("2.1.0");
        assert_eq!(engine.version(), "2.1.0");
    }

    #[test]
    fn test_default_preamble_is_identity() {
        let engine = CommandInstrumenter::new("inst", Vec::<String>::new());
        assert_eq!(engine.preamble("code()", "a.js"), "code()");
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_program_over_stdin() {
        // The file key arrives as `$0` of the inline script.
        let engine = CommandInstrumenter::new("sh", ["-c", "cat; printf '//%s' \"$0\""]);
        let out = engine.instrument("run();\n", "lib/a.js").unwrap();
        assert_eq!(out, "run();\n//lib/a.js");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_is_engine_error() {
        let engine = CommandInstrumenter::new("sh", ["-c", "echo boom >&2; exit 3"]);
        let err = engine.instrument("x", "lib/a.js").unwrap_err();
        match err {
            CovError::Engine { file, message } => {
                assert_eq!(file, "lib/a.js");
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_version_tracks_script_contents() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("inst.js");
        fs::write(&script, "v1").unwrap();
        let arg = script.display().to_string();
        let before = CommandInstrumenter::new("node", [arg.as_str()]).version();
        assert_eq!(before, CommandInstrumenter::new("node", [arg.as_str()]).version());

        fs::write(&script, "v2").unwrap();
        let after = CommandInstrumenter::new("node", [arg.as_str()]).version();
        assert_ne!(before, after);
        assert!(after.starts_with(&format!("node {arg}#")));
    }

    #[test]
    fn test_version_tracks_program_file() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("instrument");
        fs::write(&program, "old").unwrap();
        let before = CommandInstrumenter::new(&program, Vec::<String>::new()).version();

        fs::write(&program, "a longer replacement").unwrap();
        let after = CommandInstrumenter::new(&program, Vec::<String>::new()).version();
        assert_ne!(before, after);
    }

    #[test]
    fn test_missing_program_is_engine_error() {
        let engine = CommandInstrumenter::new("/nonexistent/instrumenter", Vec::<String>::new());
        assert!(matches!(
            engine.instrument("x", "a.js"),
            Err(CovError::Engine { .. })
        ));
    }
}
