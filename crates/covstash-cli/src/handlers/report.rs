//! Report command handler

use super::open_session_with;
use crate::commands::{ReportArgs, ReportFormat};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::StatusPrinter;
use covstash::{Collector, CovResult, CoverageMap, FileCoverage, MergingCollector, Reporter};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the merged JSON report
pub const FINAL_REPORT: &str = "coverage-final.json";

/// Reporter behind the `text` and `json` formats.
///
/// Text output is buffered so the caller decides where it goes.
#[derive(Debug, Default)]
pub struct CliReporter {
    formats: Vec<ReportFormat>,
    unknown: Vec<String>,
    output_dir: PathBuf,
    text: Option<String>,
    written: Vec<PathBuf>,
}

impl CliReporter {
    /// Reporter writing file-based reports under `output_dir`
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Enabled formats, in order of first mention
    #[must_use]
    pub fn formats(&self) -> &[ReportFormat] {
        &self.formats
    }

    /// Reporter names that matched no known format
    #[must_use]
    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }

    /// Rendered text report, once written
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Files produced by the last write
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl Reporter for CliReporter {
    fn add(&mut self, name: &str) {
        match ReportFormat::from_name(name) {
            Some(format) if !self.formats.contains(&format) => self.formats.push(format),
            Some(_) => {}
            None => {
                tracing::warn!(reporter = name, "unknown reporter");
                self.unknown.push(name.to_string());
            }
        }
    }

    fn write(&mut self, collector: &dyn Collector) -> CovResult<()> {
        let merged = collector.merged();
        self.written.clear();
        for format in &self.formats {
            match format {
                ReportFormat::Text => self.text = Some(render_text(&merged)),
                ReportFormat::Json => {
                    let path = write_json(&self.output_dir, &merged)?;
                    self.written.push(path);
                }
            }
        }
        Ok(())
    }
}

fn write_json(dir: &Path, merged: &CoverageMap) -> CovResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(FINAL_REPORT);
    fs::write(&path, render_json(merged)?)?;
    tracing::info!(path = %path.display(), files = merged.len(), "wrote json report");
    Ok(path)
}

/// Merged coverage map as pretty-printed JSON
pub fn render_json(merged: &CoverageMap) -> CovResult<String> {
    Ok(serde_json::to_string_pretty(merged)?)
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    covered: usize,
    total: usize,
}

impl Tally {
    fn add(&mut self, other: Self) {
        self.covered += other.covered;
        self.total += other.total;
    }

    fn of<'a>(hits: impl Iterator<Item = &'a u64>) -> Self {
        hits.fold(Self::default(), |mut t, hits| {
            t.total += 1;
            if *hits > 0 {
                t.covered += 1;
            }
            t
        })
    }
}

impl std::fmt::Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.covered, self.total)
    }
}

fn tallies(file: &FileCoverage) -> [Tally; 3] {
    [
        Tally::of(file.s.values()),
        Tally::of(file.b.values().flatten()),
        Tally::of(file.f.values()),
    ]
}

/// Per-file covered/total counts for statements, branches and functions
#[must_use]
pub fn render_text(merged: &CoverageMap) -> String {
    const ALL: &str = "All files";
    let width = merged
        .keys()
        .map(String::len)
        .chain(std::iter::once(ALL.len()))
        .max()
        .unwrap_or(ALL.len());

    let mut out = format!(
        "{:<width$} | {:>10} | {:>10} | {:>10}\n",
        "File", "Stmts", "Branches", "Funcs"
    );
    out.push_str(&format!("{}\n", "-".repeat(width + 39)));

    let mut totals = [Tally::default(); 3];
    for (key, file) in merged {
        let [s, b, f] = tallies(file);
        for (total, t) in totals.iter_mut().zip([s, b, f]) {
            total.add(t);
        }
        out.push_str(&format!(
            "{key:<width$} | {:>10} | {:>10} | {:>10}\n",
            s.to_string(),
            b.to_string(),
            f.to_string()
        ));
    }

    let [s, b, f] = totals;
    out.push_str(&format!(
        "{ALL:<width$} | {:>10} | {:>10} | {:>10}\n",
        s.to_string(),
        b.to_string(),
        f.to_string()
    ));
    out
}

/// Execute the report command
pub fn execute_report(
    config: &CliConfig,
    args: &ReportArgs,
    printer: &StatusPrinter,
) -> CliResult<()> {
    let mut coverage = config.coverage_config()?;
    if !args.reporters.is_empty() {
        coverage = coverage.with_reporters(args.reporters.iter().copied().map(ReportFormat::name));
    }
    let output_dir = coverage.cwd.join(&args.output);
    let session = open_session_with(config, coverage)?;

    let mut collector = MergingCollector::new();
    let mut reporter = CliReporter::new(output_dir);
    session.report(&mut collector, &mut reporter)?;

    for name in reporter.unknown() {
        printer.warning(&format!("unknown reporter '{name}' ignored"));
    }
    if let Some(text) = reporter.text() {
        print!("{text}");
    }
    for path in reporter.written() {
        printer.success(&format!("wrote {}", path.display()));
    }
    printer.info(&format!(
        "{} process snapshot(s), {} file(s)",
        collector.snapshots(),
        collector.merged().len()
    ));
    Ok(())
}
