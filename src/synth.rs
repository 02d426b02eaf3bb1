//! Synthetic EDF recordings
//!
//! Deterministic recordings for experiments, tests and benches: a valid
//! header followed by seeded pseudo-random samples, with optional injected
//! differences at chosen flat indices.

use crate::recording::encode_edf_header;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthSpec {
    pub samples_per_record: Vec<u32>,
    pub num_records: u64,
    pub seed: u64,
    /// Samples are drawn from `-amplitude..=amplitude`
    pub amplitude: i16,
    pub physical_minimum: f64,
    /// `(flat_index, delta)` pairs added to the generated samples
    pub perturbations: Vec<(u64, i16)>,
}

impl Default for SynthSpec {
    fn default() -> Self {
        Self {
            samples_per_record: vec![256; 4],
            num_records: 60,
            seed: 42,
            amplitude: 1000,
            physical_minimum: -3200.0,
            perturbations: Vec::new(),
        }
    }
}

impl SynthSpec {
    pub fn record_length(&self) -> u64 {
        self.samples_per_record.iter().map(|&n| n as u64).sum()
    }

    pub fn total_samples(&self) -> u64 {
        self.record_length() * self.num_records
    }
}

/// Write a seeded recording described by `spec`
pub fn write_recording(path: &Path, spec: &SynthSpec) -> Result<()> {
    anyhow::ensure!(
        !spec.samples_per_record.is_empty(),
        "a recording needs at least one channel"
    );
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let amplitude = spec.amplitude.max(0);

    let mut perturbations = spec.perturbations.clone();
    perturbations.sort_by_key(|&(flat, _)| flat);
    let mut pending = perturbations.into_iter().peekable();

    let file = File::create(path)
        .with_context(|| format!("Failed to create recording: {}", path.display()))?;
    let mut writer = BufWriter::with_capacity(4 * 1024 * 1024, file);
    writer.write_all(&encode_edf_header(
        &spec.samples_per_record,
        spec.num_records,
        spec.physical_minimum,
    ))?;

    for flat in 0..spec.total_samples() {
        let mut sample: i16 = rng.gen_range(-amplitude..=amplitude);
        while let Some(&(at, delta)) = pending.peek() {
            if at != flat {
                break;
            }
            sample = sample.wrapping_add(delta);
            pending.next();
        }
        writer.write_all(&sample.to_le_bytes())?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write recording: {}", path.display()))?;
    Ok(())
}

/// Write a recording holding exactly `samples` (flat order) after a header
pub fn write_recording_from_samples(
    path: &Path,
    samples_per_record: &[u32],
    physical_minimum: f64,
    samples: &[i16],
) -> Result<()> {
    let record_length: u64 = samples_per_record.iter().map(|&n| n as u64).sum();
    let num_records = if record_length == 0 {
        0
    } else {
        samples.len() as u64 / record_length
    };

    let file = File::create(path)
        .with_context(|| format!("Failed to create recording: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&encode_edf_header(samples_per_record, num_records, physical_minimum))?;
    for s in samples {
        writer.write_all(&s.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}
