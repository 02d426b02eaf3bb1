//! Test helpers for recording comparison

use edf_parity::synth::write_recording_from_samples;
use edf_parity::CompareConfig;
use std::path::{Path, PathBuf};

pub const PHYSICAL_MINIMUM: f64 = -3200.0;

/// Write `samples` as an EDF recording named `<name>.edf` in `dir`
pub fn write_edf(dir: &Path, name: &str, layout: &[u32], samples: &[i16]) -> PathBuf {
    write_edf_with_minimum(dir, name, layout, samples, PHYSICAL_MINIMUM)
}

pub fn write_edf_with_minimum(
    dir: &Path,
    name: &str,
    layout: &[u32],
    samples: &[i16],
    physical_minimum: f64,
) -> PathBuf {
    let path = dir.join(format!("{}.edf", name));
    write_recording_from_samples(&path, layout, physical_minimum, samples).unwrap();
    path
}

/// Deterministic, non-constant signal with small magnitudes
pub fn signal(len: usize) -> Vec<i16> {
    (0..len).map(|i| ((i * 37) % 401) as i16 - 200).collect()
}

/// Config with a tiny window so tests cross many window boundaries
pub fn config_with_window(samples_per_window: usize) -> CompareConfig {
    CompareConfig {
        chunk_budget_bytes: samples_per_window * 2,
        ..CompareConfig::default()
    }
}
