//! Single-pair comparisons against hand-built recordings

use crate::helpers::{config_with_window, signal, write_edf, write_edf_with_minimum};
use edf_parity::differential::{compare_files, compare_pair, CancelToken, PairJob, PairResult};
use edf_parity::error::{CompareError, ErrorTag};
use edf_parity::recording::EdfHeaderReader;
use edf_parity::{CompareConfig, MismatchRecord};
use std::fs;
use tempfile::TempDir;

const LAYOUT: [u32; 2] = [10, 10];

#[test]
fn test_reflexive_comparison() {
    let dir = TempDir::new().unwrap();
    let a = write_edf(dir.path(), "seq", &LAYOUT, &signal(2000));

    let (summary, records) =
        compare_files(&a, &a, &EdfHeaderReader::new(), &config_with_window(64)).unwrap();
    assert_eq!(summary.mismatch_count, 0);
    assert_eq!(summary.max_abs_diff, 0);
    assert_eq!(summary.match_percent, 100.0);
    assert!(records.is_empty());
}

#[test]
fn test_single_mismatch() {
    let dir = TempDir::new().unwrap();
    let base = signal(2000);
    let mut changed = base.clone();
    changed[100] += 3;
    let a = write_edf(dir.path(), "seq", &LAYOUT, &base);
    let b = write_edf(dir.path(), "gpu", &LAYOUT, &changed);

    let (summary, records) =
        compare_files(&a, &b, &EdfHeaderReader::new(), &config_with_window(64)).unwrap();
    assert_eq!(summary.total_samples, 2000);
    assert_eq!(summary.mismatch_count, 1);
    assert_eq!(summary.max_abs_diff, 3);
    assert!((summary.match_percent - 99.95).abs() < 1e-9);

    // flat 100 is the first sample of record 5, channel 0
    assert_eq!(
        records,
        vec![MismatchRecord {
            channel: 0,
            sample_index: 50,
            value_a: base[100],
            value_b: changed[100],
            abs_diff: 3,
        }]
    );
}

#[test]
fn test_symmetry() {
    let dir = TempDir::new().unwrap();
    let base = signal(600);
    let mut changed = base.clone();
    for i in [0usize, 17, 299, 599] {
        changed[i] -= 11;
    }
    let a = write_edf(dir.path(), "a", &LAYOUT, &base);
    let b = write_edf(dir.path(), "b", &LAYOUT, &changed);
    let reader = EdfHeaderReader::new();
    let config = config_with_window(32);

    let (ab, forward) = compare_files(&a, &b, &reader, &config).unwrap();
    let (ba, backward) = compare_files(&b, &a, &reader, &config).unwrap();
    assert_eq!(ab, ba);
    assert_eq!(forward.len(), 4);
    for (f, r) in forward.iter().zip(&backward) {
        assert_eq!((f.channel, f.sample_index), (r.channel, r.sample_index));
        assert_eq!((f.value_a, f.value_b), (r.value_b, r.value_a));
        assert_eq!(f.abs_diff, r.abs_diff);
    }
}

#[test]
fn test_threshold_suppression() {
    let dir = TempDir::new().unwrap();
    let base = signal(1000);
    let shifted: Vec<i16> = base.iter().map(|v| v + 4).collect();
    let a = write_edf(dir.path(), "a", &LAYOUT, &base);
    let b = write_edf(dir.path(), "b", &LAYOUT, &shifted);

    let config = CompareConfig {
        error_threshold: 5,
        ..config_with_window(128)
    };
    let (summary, records) = compare_files(&a, &b, &EdfHeaderReader::new(), &config).unwrap();
    assert_eq!(summary.mismatch_count, 0);
    assert_eq!(summary.max_abs_diff, 4);
    assert_eq!(summary.match_percent, 100.0);
    assert!(records.is_empty());

    // at threshold 3 every sample is a mismatch
    let strict = CompareConfig {
        error_threshold: 3,
        ..config
    };
    let (summary, _) = compare_files(&a, &b, &EdfHeaderReader::new(), &strict).unwrap();
    assert_eq!(summary.mismatch_count, 1000);
}

#[test]
fn test_size_mismatch_is_format_mismatch() {
    let dir = TempDir::new().unwrap();
    let a = write_edf(dir.path(), "a", &LAYOUT, &signal(2000));
    let b = write_edf(dir.path(), "b", &LAYOUT, &signal(1980));

    let err = compare_files(&a, &b, &EdfHeaderReader::new(), &CompareConfig::default()).unwrap_err();
    assert!(matches!(err, CompareError::FormatMismatch { .. }), "{}", err);
}

#[test]
fn test_channel_and_calibration_prechecks() {
    let dir = TempDir::new().unwrap();
    let a = write_edf(dir.path(), "a", &LAYOUT, &signal(400));
    let single = write_edf(dir.path(), "single", &[20], &signal(400));
    let recalibrated = write_edf_with_minimum(dir.path(), "recal", &LAYOUT, &signal(400), -1.0);
    let reader = EdfHeaderReader::new();
    let config = CompareConfig::default();

    for other in [&single, &recalibrated] {
        let outcome = compare_pair(&PairJob::new(&a, other), &reader, &config, None, &CancelToken::new());
        assert_eq!(outcome.error_tag(), Some(ErrorTag::FormatMismatch));
        assert!(outcome.summary().is_none());
    }
}

#[test]
fn test_header_only_recording() {
    let dir = TempDir::new().unwrap();
    let a = write_edf(dir.path(), "a", &LAYOUT, &[]);
    let b = write_edf(dir.path(), "b", &LAYOUT, &[]);

    let outcome = compare_pair(
        &PairJob::new(&a, &b),
        &EdfHeaderReader::new(),
        &CompareConfig::default(),
        None,
        &CancelToken::new(),
    );
    assert_eq!(outcome.error_tag(), Some(ErrorTag::EmptyRecording));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let a = write_edf(dir.path(), "a", &LAYOUT, &signal(40));

    let outcome = compare_pair(
        &PairJob::new(&a, dir.path().join("missing.edf")),
        &EdfHeaderReader::new(),
        &CompareConfig::default(),
        None,
        &CancelToken::new(),
    );
    assert_eq!(outcome.error_tag(), Some(ErrorTag::IoError));
    assert_eq!(outcome.name_b, "missing");
}

#[test]
fn test_mismatch_csv_written() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let base = signal(2000);
    let mut changed = base.clone();
    changed[100] += 3;
    changed[1999] -= 9;
    let a = write_edf(dir.path(), "seq", &LAYOUT, &base);
    let b = write_edf(dir.path(), "gpu", &LAYOUT, &changed);

    let config = CompareConfig {
        emit_mismatch_stream: true,
        ..config_with_window(100)
    };
    let outcome = compare_pair(&PairJob::new(&a, &b), &EdfHeaderReader::new(), &config, Some(&out), &CancelToken::new());

    let path = outcome.mismatch_csv.clone().unwrap();
    assert_eq!(path, out.join("diff_seq_vs_gpu.csv"));
    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Channel,Sample Index,Value A (Raw),Value B (Raw),Diff");
    assert_eq!(lines[1], format!("0,50,{},{},3", base[100], changed[100]));
    // flat 1999 is the last sample of record 99, channel 1
    assert_eq!(lines[2], format!("1,999,{},{},9", base[1999], changed[1999]));
}

#[test]
fn test_identical_pair_leaves_no_csv() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let a = write_edf(dir.path(), "a", &LAYOUT, &signal(400));
    let b = write_edf(dir.path(), "b", &LAYOUT, &signal(400));

    let config = CompareConfig {
        emit_mismatch_stream: true,
        ..CompareConfig::default()
    };
    let outcome = compare_pair(&PairJob::new(&a, &b), &EdfHeaderReader::new(), &config, Some(&out), &CancelToken::new());
    assert!(outcome.summary().unwrap().is_identical());
    assert!(outcome.mismatch_csv.is_none());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_cancelled_pair_is_aborted_without_csv() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let base = signal(2000);
    let changed: Vec<i16> = base.iter().map(|v| v + 1).collect();
    let a = write_edf(dir.path(), "a", &LAYOUT, &base);
    let b = write_edf(dir.path(), "b", &LAYOUT, &changed);

    let config = CompareConfig {
        emit_mismatch_stream: true,
        ..config_with_window(50)
    };
    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = compare_pair(&PairJob::new(&a, &b), &EdfHeaderReader::new(), &config, Some(&out), &cancel);

    assert_eq!(outcome.error_tag(), Some(ErrorTag::Aborted));
    assert!(matches!(outcome.result, PairResult::Failed { .. }));
    assert!(outcome.mismatch_csv.is_none());
    let leftovers = fs::read_dir(&out).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[test]
fn test_binned_scatter_keeps_largest_per_bin() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    let base = signal(2000);
    let mut changed = base.clone();
    // channel 0, samples 0 and 1 of record 0 share a bin
    changed[0] += 2;
    changed[1] += 8;
    let a = write_edf(dir.path(), "a", &LAYOUT, &base);
    let b = write_edf(dir.path(), "b", &LAYOUT, &changed);

    let config = CompareConfig {
        enable_visualization_binning: true,
        target_bin_count: 10,
        ..config_with_window(64)
    };
    let outcome = compare_pair(&PairJob::new(&a, &b), &EdfHeaderReader::new(), &config, Some(&out), &CancelToken::new());
    assert_eq!(outcome.summary().unwrap().mismatch_count, 2);
    assert_eq!(outcome.binned_points, 1);

    let content = fs::read_to_string(out.join("bins_a_vs_b.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec!["Channel,Sample Index,Max Diff", "0,1,8"]);
}

#[test]
fn test_size_checked_before_layout() {
    let dir = TempDir::new().unwrap();
    // degenerate layout in A must not mask the size difference
    let a = write_edf(dir.path(), "a", &[4, 0], &signal(40));
    let b = write_edf(dir.path(), "b", &[4, 0], &signal(20));

    let outcome = compare_pair(
        &PairJob::new(&a, &b),
        &EdfHeaderReader::new(),
        &CompareConfig::default(),
        None,
        &CancelToken::new(),
    );
    assert_eq!(outcome.error_tag(), Some(ErrorTag::FormatMismatch));

    // same sizes: the layout itself is now the problem
    let outcome = compare_pair(
        &PairJob::new(&a, &a),
        &EdfHeaderReader::new(),
        &CompareConfig::default(),
        None,
        &CancelToken::new(),
    );
    assert_eq!(outcome.error_tag(), Some(ErrorTag::InvalidLayout));
}

#[test]
fn test_non_finite_calibration_is_reflexive() {
    let dir = TempDir::new().unwrap();
    let a = write_edf_with_minimum(dir.path(), "nan", &LAYOUT, &signal(400), f64::NAN);

    let outcome = compare_pair(
        &PairJob::new(&a, &a),
        &EdfHeaderReader::new(),
        &CompareConfig::default(),
        None,
        &CancelToken::new(),
    );
    let summary = outcome.summary().unwrap();
    assert_eq!(summary.mismatch_count, 0);
    assert_eq!(summary.match_percent, 100.0);
}

#[test]
fn test_oversized_header_layout_is_pair_scoped() {
    let dir = TempDir::new().unwrap();
    // ~4e9 samples per record declared over a 40-sample data region
    let corrupt = vec![99_999_999u32; 40];
    let a = write_edf(dir.path(), "corrupt", &corrupt, &signal(40));

    let err = compare_files(&a, &a, &EdfHeaderReader::new(), &CompareConfig::default()).unwrap_err();
    assert!(matches!(err, CompareError::InvalidLayout { .. }), "{}", err);
}

#[test]
fn test_failed_binned_write_leaves_no_mismatch_csv() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    // a directory squatting on the binned CSV name makes the persist fail
    fs::create_dir_all(out.join("bins_a_vs_b.csv")).unwrap();

    let base = signal(400);
    let mut changed = base.clone();
    changed[7] += 2;
    let a = write_edf(dir.path(), "a", &LAYOUT, &base);
    let b = write_edf(dir.path(), "b", &LAYOUT, &changed);

    let config = CompareConfig {
        emit_mismatch_stream: true,
        enable_visualization_binning: true,
        target_bin_count: 10,
        ..config_with_window(64)
    };
    let outcome = compare_pair(&PairJob::new(&a, &b), &EdfHeaderReader::new(), &config, Some(&out), &CancelToken::new());

    assert_eq!(outcome.error_tag(), Some(ErrorTag::IoError));
    assert!(outcome.mismatch_csv.is_none());
    assert!(!out.join("diff_a_vs_b.csv").exists());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
}

#[test]
fn test_compare_files_runs_header_prechecks() {
    let dir = TempDir::new().unwrap();
    let a = write_edf(dir.path(), "a", &LAYOUT, &signal(400));
    let recalibrated = write_edf_with_minimum(dir.path(), "recal", &LAYOUT, &signal(400), -1.0);

    let err = compare_files(&a, &recalibrated, &EdfHeaderReader::new(), &CompareConfig::default())
        .unwrap_err();
    assert!(matches!(err, CompareError::FormatMismatch { .. }), "{}", err);
    assert!(err.to_string().contains("calibration"), "{}", err);
}
