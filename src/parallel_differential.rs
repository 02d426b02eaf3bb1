//! Parallel Differential Comparison
//!
//! Every unordered pair of recordings in a set is an independent job. Jobs
//! run on a rayon pool sized by `num_workers`; each worker owns its own maps
//! and tables. Outcomes are collected in pair order and the aggregate
//! artifacts are written afterwards from the calling thread.

use crate::config::BatchConfig;
use crate::differential::{compare_pair, CancelToken, PairJob, PairOutcome};
use crate::recording::{EdfHeaderReader, RecordingReader};
use crate::sink::{
    summary_table_header, summary_table_row, write_json_report, write_summary_csv, DiffMatrix,
};
use crate::utils::{discover_recordings, display_names};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Overall verdict of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    /// Every pair was compared and none had mismatches
    AllMatched,
    /// At least one pair diverged or could not be compared
    Divergent,
    /// Not a single pair could be compared
    NoValidPairs,
}

impl BatchStatus {
    /// Classify collected pair outcomes
    pub fn from_outcomes(outcomes: &[PairOutcome]) -> Self {
        let mut compared = 0usize;
        let mut divergent = false;
        for o in outcomes {
            match o.summary() {
                Some(s) => {
                    compared += 1;
                    divergent |= !s.is_identical();
                }
                None => divergent = true,
            }
        }
        if compared == 0 {
            BatchStatus::NoValidPairs
        } else if divergent {
            BatchStatus::Divergent
        } else {
            BatchStatus::AllMatched
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            BatchStatus::AllMatched => 0,
            BatchStatus::Divergent => 1,
            BatchStatus::NoValidPairs => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub config: BatchConfig,
    pub files: Vec<PathBuf>,
    pub names: Vec<String>,
    pub outcomes: Vec<PairOutcome>,
    pub status: BatchStatus,
    pub duration_secs: f64,
}

impl BatchReport {
    pub fn valid_pairs(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_compared()).count()
    }

    pub fn matrix(&self) -> DiffMatrix {
        DiffMatrix::from_outcomes(self.names.clone(), &self.outcomes)
    }

    pub fn print_table(&self) {
        println!("{}", summary_table_header());
        println!("{}", "-".repeat(95));
        for outcome in &self.outcomes {
            println!("{}", summary_table_row(outcome));
        }
    }
}

/// Every unordered pair `(i, j)` with `i < j`, in lexicographic order
pub fn enumerate_pairs(files: &[PathBuf]) -> Vec<PairJob> {
    let names = display_names(files);
    let mut jobs = Vec::new();
    for i in 0..files.len() {
        for j in (i + 1)..files.len() {
            jobs.push(PairJob {
                index_a: i,
                index_b: j,
                path_a: files[i].clone(),
                path_b: files[j].clone(),
                name_a: names[i].clone(),
                name_b: names[j].clone(),
            });
        }
    }
    jobs
}

/// Compare every pair of `files` on a worker pool
///
/// Per-pair failures end up in the outcomes; only pool construction and
/// invalid configuration are errors here.
pub fn run_pairs(
    files: &[PathBuf],
    config: &BatchConfig,
    reader: &dyn RecordingReader,
    cancel: &CancelToken,
) -> Result<BatchReport> {
    config.validate()?;
    let start = Instant::now();
    let jobs = enumerate_pairs(files);
    let output_dir = config.output_dir.as_path();

    tracing::info!(
        files = files.len(),
        pairs = jobs.len(),
        workers = config.num_workers,
        "starting batch"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_workers)
        .build()
        .context("Failed to build worker pool")?;

    let outcomes: Vec<PairOutcome> = pool.install(|| {
        jobs.par_iter()
            .map(|job| compare_pair(job, reader, &config.compare, Some(output_dir), cancel))
            .collect()
    });

    let status = BatchStatus::from_outcomes(&outcomes);
    let duration_secs = start.elapsed().as_secs_f64();
    tracing::info!(?status, duration_secs, "batch finished");

    Ok(BatchReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        config: config.clone(),
        files: files.to_vec(),
        names: display_names(files),
        outcomes,
        status,
        duration_secs,
    })
}

/// Write `summary.csv`, `matrix.csv` and `report.json` into the output dir
pub fn write_reports(report: &BatchReport) -> Result<()> {
    let dir = report.config.output_dir.as_path();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    write_summary_csv(&dir.join("summary.csv"), &report.outcomes)?;
    report.matrix().write_csv(&dir.join("matrix.csv"))?;
    write_json_report(&dir.join("report.json"), report)?;
    Ok(())
}

/// Discover recordings in `dir` and compare all of them pairwise
pub fn run_batch(dir: &Path, config: &BatchConfig) -> Result<BatchReport> {
    let files = discover_recordings(dir, &config.extension)?;
    if files.len() < 2 {
        tracing::warn!(
            dir = %dir.display(),
            found = files.len(),
            "need at least two recordings to compare"
        );
    }

    let cancel = CancelToken::with_timeout(config.timeout);
    let report = run_pairs(&files, config, &EdfHeaderReader::new(), &cancel)?;
    if config.write_reports {
        write_reports(&report)?;
    }
    Ok(report)
}
