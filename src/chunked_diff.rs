//! Chunked binary diff over two memory-mapped recordings
//!
//! The sample region of each file (everything after the header) is read as
//! signed 16-bit little-endian samples, one bounded window at a time. A
//! window whose largest difference stays within the threshold is counted as
//! all matches without per-element bookkeeping; otherwise each element is
//! tested and mismatches are kept with their window-local index.
//!
//! Windows are a performance artifact only: totals and the set of mismatches
//! are the same for any window length.

use crate::config::{CompareConfig, SAMPLE_BYTES};
use crate::coordinate::{resolve_window, Coordinate};
use crate::error::{CompareError, Result};
use crate::layout_index::LayoutTables;
use memmap2::{Mmap, MmapOptions};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// One sample that differs by more than the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchRecord {
    pub channel: u32,
    pub sample_index: u64,
    pub value_a: i16,
    pub value_b: i16,
    pub abs_diff: u16,
}

/// Totals for one file pair, accumulated across all windows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairSummary {
    pub total_samples: u64,
    pub match_count: u64,
    pub mismatch_count: u64,
    pub max_abs_diff: i32,
    pub match_percent: f64,
}

impl PairSummary {
    pub fn from_totals(total_samples: u64, match_count: u64, mismatch_count: u64, max: u16) -> Self {
        let match_percent = if total_samples == 0 {
            0.0
        } else {
            match_count as f64 * 100.0 / total_samples as f64
        };
        Self {
            total_samples,
            match_count,
            mismatch_count,
            max_abs_diff: max as i32,
            match_percent,
        }
    }

    pub fn is_identical(&self) -> bool {
        self.mismatch_count == 0
    }
}

/// Mismatches found in one window, indexed relative to `start`
#[derive(Debug, Clone, Default)]
pub struct WindowDiff {
    /// Flat index of the first sample in the window
    pub start: u64,
    /// Samples in the window
    pub len: usize,
    /// Largest difference seen in the window
    pub max_abs_diff: u16,
    pub local_indices: Vec<u32>,
    pub values_a: Vec<i16>,
    pub values_b: Vec<i16>,
    pub diffs: Vec<u16>,
}

impl WindowDiff {
    pub fn mismatch_count(&self) -> usize {
        self.local_indices.len()
    }

    /// Resolve this window's mismatches against a record layout
    pub fn records(&self, tables: &LayoutTables) -> Vec<MismatchRecord> {
        let mut coords: Vec<Coordinate> = Vec::with_capacity(self.local_indices.len());
        resolve_window(self.start, &self.local_indices, tables, &mut coords);

        coords
            .into_iter()
            .enumerate()
            .map(|(i, coord)| MismatchRecord {
                channel: coord.channel,
                sample_index: coord.sample_index,
                value_a: self.values_a[i],
                value_b: self.values_b[i],
                abs_diff: self.diffs[i],
            })
            .collect()
    }
}

#[inline]
fn samples(bytes: &[u8]) -> impl Iterator<Item = i16> + '_ {
    bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
}

/// Map a file read-only
fn map_readonly(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(|e| CompareError::io(path, e))?;
    // SAFETY: inputs are static, already-written recordings; nothing in this
    // process writes to them while the map is alive.
    unsafe { MmapOptions::new().map(&file) }.map_err(|e| CompareError::io(path, e))
}

/// Files can be truncated between the size check and the map
fn check_mapped_len(path: &Path, map: &Mmap, expected: u64) -> Result<()> {
    if map.len() as u64 == expected {
        return Ok(());
    }
    Err(CompareError::io(
        path,
        std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("file changed size while being mapped: {} of {} bytes", map.len(), expected),
        ),
    ))
}

fn file_size(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| CompareError::io(path, e))
}

/// Streams the window-by-window diff of two recordings
pub struct ChunkedDiffer {
    map_a: Mmap,
    map_b: Mmap,
    header_size: usize,
    total_samples: u64,
    window_len: usize,
    threshold: u16,
    cursor: u64,
    windows_done: u64,
    match_count: u64,
    mismatch_count: u64,
    max_abs_diff: u16,
}

impl ChunkedDiffer {
    /// Check structure and map both files
    ///
    /// Sizes are compared before either file is mapped.
    pub fn open(
        path_a: &Path,
        path_b: &Path,
        header_size: u64,
        config: &CompareConfig,
    ) -> Result<Self> {
        config.validate()?;

        let size_a = file_size(path_a)?;
        let size_b = file_size(path_b)?;
        if size_a != size_b {
            return Err(CompareError::format_mismatch(format!(
                "size mismatch: {} is {} bytes, {} is {} bytes",
                path_a.display(),
                size_a,
                path_b.display(),
                size_b
            )));
        }

        let sample_bytes = size_a as i64 - header_size as i64;
        if sample_bytes <= 0 || sample_bytes % SAMPLE_BYTES as i64 != 0 {
            return Err(CompareError::EmptyRecording {
                path: PathBuf::from(path_a),
                sample_bytes,
                header_size,
            });
        }

        let map_a = map_readonly(path_a)?;
        let map_b = map_readonly(path_b)?;
        check_mapped_len(path_a, &map_a, size_a)?;
        check_mapped_len(path_b, &map_b, size_b)?;

        Ok(Self {
            map_a,
            map_b,
            header_size: header_size as usize,
            total_samples: sample_bytes as u64 / SAMPLE_BYTES as u64,
            window_len: config.window_len().min(u32::MAX as usize),
            threshold: config.error_threshold,
            cursor: 0,
            windows_done: 0,
            match_count: 0,
            mismatch_count: 0,
            max_abs_diff: 0,
        })
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn windows_done(&self) -> u64 {
        self.windows_done
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.total_samples
    }

    /// Final totals; `None` until every window has been consumed
    pub fn summary(&self) -> Option<PairSummary> {
        if !self.is_exhausted() {
            return None;
        }
        Some(PairSummary::from_totals(
            self.total_samples,
            self.match_count,
            self.mismatch_count,
            self.max_abs_diff,
        ))
    }

    /// Compare any remaining windows without yielding them and return totals
    pub fn finish(mut self) -> PairSummary {
        for _ in self.by_ref() {}
        PairSummary::from_totals(
            self.total_samples,
            self.match_count,
            self.mismatch_count,
            self.max_abs_diff,
        )
    }

    fn window_bytes(&self, start: u64, end: u64) -> (&[u8], &[u8]) {
        let from = self.header_size + start as usize * SAMPLE_BYTES;
        let to = self.header_size + end as usize * SAMPLE_BYTES;
        (&self.map_a[from..to], &self.map_b[from..to])
    }

    fn diff_window(&mut self, start: u64, end: u64) -> WindowDiff {
        let threshold = self.threshold;
        let len = (end - start) as usize;
        let (bytes_a, bytes_b) = self.window_bytes(start, end);

        let window_max = samples(bytes_a)
            .zip(samples(bytes_b))
            .map(|(a, b)| a.abs_diff(b))
            .max()
            .unwrap_or(0);

        let mut window = WindowDiff {
            start,
            len,
            max_abs_diff: window_max,
            ..Default::default()
        };

        if window_max > threshold {
            for (i, (a, b)) in samples(bytes_a).zip(samples(bytes_b)).enumerate() {
                let diff = a.abs_diff(b);
                if diff > threshold {
                    window.local_indices.push(i as u32);
                    window.values_a.push(a);
                    window.values_b.push(b);
                    window.diffs.push(diff);
                }
            }
        }

        let mismatches = window.local_indices.len() as u64;
        self.mismatch_count += mismatches;
        self.match_count += len as u64 - mismatches;
        self.max_abs_diff = self.max_abs_diff.max(window_max);

        tracing::debug!(
            start,
            len,
            window_max,
            mismatches,
            "window compared"
        );
        window
    }
}

impl Iterator for ChunkedDiffer {
    type Item = WindowDiff;

    fn next(&mut self) -> Option<WindowDiff> {
        if self.is_exhausted() {
            return None;
        }
        let start = self.cursor;
        let end = (start + self.window_len as u64).min(self.total_samples);
        let window = self.diff_window(start, end);
        self.cursor = end;
        self.windows_done += 1;
        Some(window)
    }
}
