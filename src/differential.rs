//! Differential comparison of one recording pair
//!
//! Runs the full chain for a pair: header pre-checks, layout tables, the
//! chunked diff, coordinate resolution, and the optional sinks. Every
//! failure is captured in the pair's [`PairOutcome`] so a batch can carry on.

use crate::binner::VisualizationBinner;
use crate::chunked_diff::{ChunkedDiffer, MismatchRecord, PairSummary};
use crate::config::CompareConfig;
use crate::error::{CompareError, ErrorTag, Result};
use crate::layout_index::LayoutTables;
use crate::recording::RecordingReader;
use crate::sink::{write_binned_csv, CsvMismatchWriter};
use crate::utils::display_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag with an optional deadline
///
/// Checked between windows only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Two recordings to compare; indices refer to the batch's file list
///
/// Names key the per-pair artifacts, so within a batch they must be unique.
#[derive(Debug, Clone)]
pub struct PairJob {
    pub index_a: usize,
    pub index_b: usize,
    pub path_a: PathBuf,
    pub path_b: PathBuf,
    pub name_a: String,
    pub name_b: String,
}

impl PairJob {
    pub fn new(path_a: impl Into<PathBuf>, path_b: impl Into<PathBuf>) -> Self {
        let (path_a, path_b) = (path_a.into(), path_b.into());
        Self {
            index_a: 0,
            index_b: 1,
            name_a: display_name(&path_a),
            name_b: display_name(&path_b),
            path_a,
            path_b,
        }
    }
}

/// Comparison result for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PairResult {
    Compared(PairSummary),
    Failed { tag: ErrorTag, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairOutcome {
    pub name_a: String,
    pub name_b: String,
    pub index_a: usize,
    pub index_b: usize,
    pub result: PairResult,
    /// Persisted mismatch CSV, if any rows were written
    pub mismatch_csv: Option<PathBuf>,
    /// Retained scatter points when binning is enabled
    pub binned_points: usize,
    pub duration_secs: f64,
}

impl PairOutcome {
    pub fn summary(&self) -> Option<&PairSummary> {
        match &self.result {
            PairResult::Compared(s) => Some(s),
            PairResult::Failed { .. } => None,
        }
    }

    pub fn is_compared(&self) -> bool {
        self.summary().is_some()
    }

    pub fn error_tag(&self) -> Option<ErrorTag> {
        match &self.result {
            PairResult::Failed { tag, .. } => Some(*tag),
            PairResult::Compared(_) => None,
        }
    }
}

struct PairRun {
    summary: PairSummary,
    mismatch_csv: Option<PathBuf>,
    binned_points: usize,
}

/// Compare one pair; never fails, errors are recorded in the outcome
pub fn compare_pair(
    job: &PairJob,
    reader: &dyn RecordingReader,
    config: &CompareConfig,
    output_dir: Option<&Path>,
    cancel: &CancelToken,
) -> PairOutcome {
    let start = Instant::now();
    let name_a = job.name_a.clone();
    let name_b = job.name_b.clone();

    let (result, mismatch_csv, binned_points) =
        match run_pair(job, &name_a, &name_b, reader, config, output_dir, cancel) {
            Ok(run) => {
                tracing::info!(
                    a = %name_a,
                    b = %name_b,
                    mismatches = run.summary.mismatch_count,
                    max_abs_diff = run.summary.max_abs_diff,
                    "pair compared"
                );
                (PairResult::Compared(run.summary), run.mismatch_csv, run.binned_points)
            }
            Err(e) => {
                tracing::warn!(a = %name_a, b = %name_b, error = %e, "pair skipped");
                (
                    PairResult::Failed {
                        tag: e.tag(),
                        message: e.to_string(),
                    },
                    None,
                    0,
                )
            }
        };

    PairOutcome {
        name_a,
        name_b,
        index_a: job.index_a,
        index_b: job.index_b,
        result,
        mismatch_csv,
        binned_points,
        duration_secs: start.elapsed().as_secs_f64(),
    }
}

fn run_pair(
    job: &PairJob,
    name_a: &str,
    name_b: &str,
    reader: &dyn RecordingReader,
    config: &CompareConfig,
    output_dir: Option<&Path>,
    cancel: &CancelToken,
) -> Result<PairRun> {
    let (tables, mut differ) = open_pair(&job.path_a, &job.path_b, reader, config)?;

    let mut csv = match output_dir {
        Some(dir) if config.emit_mismatch_stream => {
            Some(CsvMismatchWriter::create(dir, name_a, name_b)?)
        }
        _ => None,
    };
    let mut binner = config.enable_visualization_binning.then(|| {
        VisualizationBinner::new(
            tables.num_channels(),
            tables.max_samples_per_channel(differ.total_samples()),
            config.target_bin_count,
        )
    });
    let need_records = csv.is_some() || binner.is_some();

    while !differ.is_exhausted() {
        if cancel.is_cancelled() {
            if let Some(writer) = csv.take() {
                writer.discard();
            }
            return Err(CompareError::Aborted {
                windows_done: differ.windows_done(),
            });
        }
        let Some(window) = differ.next() else { break };
        if !need_records || window.mismatch_count() == 0 {
            continue;
        }

        let records = window.records(&tables);
        if let Some(writer) = csv.as_mut() {
            for record in &records {
                writer.write(record)?;
            }
        }
        if let Some(binner) = binner.as_mut() {
            binner.extend(&records);
        }
    }

    let summary = differ.finish();

    // Binned grid first: if it fails, the uncommitted mismatch CSV is dropped with it
    let mut binned_points = 0;
    let mut binned_csv = None;
    if let Some(binner) = binner {
        let points = binner.into_records();
        binned_points = points.len();
        if let Some(dir) = output_dir.filter(|_| !points.is_empty()) {
            let path = dir.join(format!("bins_{}_vs_{}.csv", name_a, name_b));
            write_binned_csv(&path, &points)
                .map_err(|e| CompareError::io(&path, std::io::Error::other(format!("{:#}", e))))?;
            binned_csv = Some(path);
        }
    }

    let mismatch_csv = match csv {
        Some(writer) => writer.commit().inspect_err(|_| {
            if let Some(path) = &binned_csv {
                let _ = std::fs::remove_file(path);
            }
        })?,
        None => None,
    };

    Ok(PairRun {
        summary,
        mismatch_csv,
        binned_points,
    })
}

/// Header pre-checks, structural checks, then layout tables
///
/// Sizes are compared inside [`ChunkedDiffer::open`] before any layout work,
/// and the tables are bounded by the recording's sample count.
fn open_pair(
    path_a: &Path,
    path_b: &Path,
    reader: &dyn RecordingReader,
    config: &CompareConfig,
) -> Result<(LayoutTables, ChunkedDiffer)> {
    let info_a = reader.read_info(path_a)?;
    let info_b = reader.read_info(path_b)?;

    if info_a.num_channels != info_b.num_channels {
        return Err(CompareError::format_mismatch(format!(
            "channel count mismatch: {} vs {}",
            info_a.num_channels, info_b.num_channels
        )));
    }
    if info_a.token != info_b.token {
        return Err(CompareError::format_mismatch(format!(
            "calibration mismatch: physical minimum {} vs {}",
            info_a.token.physical_minimum, info_b.token.physical_minimum
        )));
    }

    let differ = ChunkedDiffer::open(path_a, path_b, info_a.header_size, config)?;
    // Layout comes from file A only; B is assumed to share it
    let tables =
        LayoutTables::build_for_recording(&info_a.samples_per_record, differ.total_samples())?;
    Ok((tables, differ))
}

/// Compare two files and collect every mismatch in memory
///
/// Runs the same pre-checks as [`compare_pair`]. Intended for small
/// recordings and tests; large pairs should go through [`compare_pair`]
/// with a CSV sink.
pub fn compare_files(
    path_a: &Path,
    path_b: &Path,
    reader: &dyn RecordingReader,
    config: &CompareConfig,
) -> Result<(PairSummary, Vec<MismatchRecord>)> {
    let (tables, mut differ) = open_pair(path_a, path_b, reader, config)?;

    let mut records = Vec::new();
    for window in differ.by_ref() {
        records.extend(window.records(&tables));
    }
    Ok((differ.finish(), records))
}
