//! Output sinks
//!
//! Per-pair artifacts (mismatch CSV, binned scatter CSV) are written to a
//! temp file in the output directory and only persisted under their final
//! name once the pair completes, so an aborted pair never leaves a truncated
//! file behind. Aggregate artifacts are written once by the coordinating
//! thread after every pair has finished.

use crate::chunked_diff::MismatchRecord;
use crate::differential::{PairOutcome, PairResult};
use crate::error::{CompareError, Result};
use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const MISMATCH_CSV_HEADER: &str = "Channel,Sample Index,Value A (Raw),Value B (Raw),Diff";

/// Matrix cell for a pair that could not be compared
pub const MATRIX_ERROR_SENTINEL: i64 = -1;

/// Write `contents` to `path` through a temp file in the same directory
fn write_atomic(path: &Path, contents: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    let mut writer = BufWriter::new(temp);
    contents(&mut writer).with_context(|| format!("Failed to write {}", path.display()))?;
    let temp = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to persist {}", path.display()))?;
    Ok(())
}

/// Streams one pair's mismatches into `diff_<a>_vs_<b>.csv`
pub struct CsvMismatchWriter {
    writer: BufWriter<NamedTempFile>,
    final_path: PathBuf,
    rows: u64,
}

impl CsvMismatchWriter {
    pub fn create(output_dir: &Path, name_a: &str, name_b: &str) -> Result<Self> {
        fs::create_dir_all(output_dir).map_err(|e| CompareError::io(output_dir, e))?;
        let temp = NamedTempFile::new_in(output_dir).map_err(|e| CompareError::io(output_dir, e))?;

        let final_path = output_dir.join(format!("diff_{}_vs_{}.csv", name_a, name_b));
        let mut writer = BufWriter::with_capacity(1024 * 1024, temp);
        writeln!(writer, "{}", MISMATCH_CSV_HEADER).map_err(|e| CompareError::io(&final_path, e))?;

        Ok(Self {
            writer,
            final_path,
            rows: 0,
        })
    }

    pub fn write(&mut self, record: &MismatchRecord) -> Result<()> {
        writeln!(
            self.writer,
            "{},{},{},{},{}",
            record.channel, record.sample_index, record.value_a, record.value_b, record.abs_diff
        )
        .map_err(|e| CompareError::io(&self.final_path, e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Persist under the final name; a file without rows is removed instead
    pub fn commit(self) -> Result<Option<PathBuf>> {
        let Self {
            writer,
            final_path,
            rows,
        } = self;

        if rows == 0 {
            // Dropping the temp file deletes it
            return Ok(None);
        }

        let temp = writer
            .into_inner()
            .map_err(|e| CompareError::io(&final_path, e.into_error()))?;
        temp.persist(&final_path)
            .map_err(|e| CompareError::io(&final_path, e.error))?;
        Ok(Some(final_path))
    }

    /// Drop everything written so far
    pub fn discard(self) {
        tracing::debug!(path = %self.final_path.display(), rows = self.rows, "discarding partial mismatch CSV");
    }
}

/// Write the binned scatter grid of one pair
pub fn write_binned_csv(path: &Path, records: &[MismatchRecord]) -> anyhow::Result<()> {
    write_atomic(path, |w| {
        writeln!(w, "Channel,Sample Index,Max Diff")?;
        for r in records {
            writeln!(w, "{},{},{}", r.channel, r.sample_index, r.abs_diff)?;
        }
        Ok(())
    })
}

pub fn summary_table_header() -> String {
    format!(
        "{:<25} | {:<25} | {:<10} | {:<12} | {:<12}",
        "FILE A", "FILE B", "MATCH %", "DIFF COUNT", "RAW MAX DIFF"
    )
}

pub fn summary_table_row(outcome: &PairOutcome) -> String {
    match &outcome.result {
        PairResult::Compared(summary) => format!(
            "{:<25} | {:<25} | {:9.2}% | {:<12} | {:<12}",
            outcome.name_a,
            outcome.name_b,
            summary.match_percent,
            summary.mismatch_count,
            summary.max_abs_diff
        ),
        PairResult::Failed { tag, .. } => format!(
            "{:<25} | {:<25} | {:<10} | {:<12} | {}",
            outcome.name_a, outcome.name_b, "-", "-", tag
        ),
    }
}

/// One row per pair; failed pairs carry their tag instead of numbers
pub fn write_summary_csv(path: &Path, outcomes: &[PairOutcome]) -> anyhow::Result<()> {
    write_atomic(path, |w| {
        writeln!(w, "File A,File B,Match %,Diff Count,Max Diff,Status")?;
        for o in outcomes {
            match &o.result {
                PairResult::Compared(s) => writeln!(
                    w,
                    "{},{},{:.6},{},{},OK",
                    o.name_a, o.name_b, s.match_percent, s.mismatch_count, s.max_abs_diff
                )?,
                PairResult::Failed { tag, .. } => {
                    writeln!(w, "{},{},,,,{}", o.name_a, o.name_b, tag)?
                }
            }
        }
        Ok(())
    })
}

/// Symmetric N x N mismatch-count matrix over a file set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffMatrix {
    pub names: Vec<String>,
    /// Row-major, `names.len()` squared
    pub cells: Vec<i64>,
}

impl DiffMatrix {
    /// Diagonal is 0, uncompared pairs start as the error sentinel
    pub fn new(names: Vec<String>) -> Self {
        let n = names.len();
        let mut cells = vec![MATRIX_ERROR_SENTINEL; n * n];
        for i in 0..n {
            cells[i * n + i] = 0;
        }
        Self { names, cells }
    }

    pub fn from_outcomes(names: Vec<String>, outcomes: &[PairOutcome]) -> Self {
        let mut matrix = Self::new(names);
        for o in outcomes {
            let value = match &o.result {
                PairResult::Compared(s) => s.mismatch_count as i64,
                PairResult::Failed { .. } => MATRIX_ERROR_SENTINEL,
            };
            matrix.set(o.index_a, o.index_b, value);
        }
        matrix
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> i64 {
        self.cells[i * self.len() + j]
    }

    fn set(&mut self, i: usize, j: usize, value: i64) {
        let n = self.len();
        if i < n && j < n {
            self.cells[i * n + j] = value;
            self.cells[j * n + i] = value;
        }
    }

    pub fn write_csv(&self, path: &Path) -> anyhow::Result<()> {
        write_atomic(path, |w| {
            for name in &self.names {
                write!(w, ",{}", name)?;
            }
            writeln!(w)?;
            for (i, name) in self.names.iter().enumerate() {
                write!(w, "{}", name)?;
                for j in 0..self.len() {
                    write!(w, ",{}", self.get(i, j))?;
                }
                writeln!(w)?;
            }
            Ok(())
        })
    }
}

/// Pretty-printed JSON of any serializable report
pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    write_atomic(path, |w| w.write_all(json.as_bytes()))
}
