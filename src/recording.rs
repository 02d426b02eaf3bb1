//! Recording metadata
//!
//! The comparator only needs three things from a recording's header: how
//! many channels it has, how one record splits across them, and a cheap
//! calibration token to reject incompatible files early. [`RecordingReader`]
//! is the seam; [`EdfHeaderReader`] reads them from an EDF/EDF+ header.
//!
//! EDF header layout: a 256-byte main header followed by 256 bytes per
//! signal, stored field-major (all labels, then all transducers, ...). Every
//! field is space-padded ASCII.

use crate::error::{CompareError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Size of the fixed part of an EDF header
pub const MAIN_HEADER_BYTES: u64 = 256;
/// Header bytes added per signal
pub const SIGNAL_HEADER_BYTES: u64 = 256;

/// Header size for a recording with `num_channels` signals
pub fn header_size(num_channels: usize) -> u64 {
    MAIN_HEADER_BYTES + num_channels as u64 * SIGNAL_HEADER_BYTES
}

/// Cheap per-file metadata compared before any sample is read
///
/// Equality is on the bit pattern, so a header field that parses to NaN
/// still matches itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompatibilityToken {
    /// Physical minimum of the first channel
    pub physical_minimum: f64,
}

impl PartialEq for CompatibilityToken {
    fn eq(&self, other: &Self) -> bool {
        self.physical_minimum.to_bits() == other.physical_minimum.to_bits()
    }
}

impl Eq for CompatibilityToken {}

/// Structure of one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub num_channels: usize,
    /// Samples per record for each channel, in storage order
    pub samples_per_record: Vec<u32>,
    /// Declared number of records; `None` when the header says unknown (-1)
    pub num_records: Option<u64>,
    pub header_size: u64,
    pub token: CompatibilityToken,
}

/// Source of recording metadata
pub trait RecordingReader: Send + Sync {
    fn read_info(&self, path: &Path) -> Result<RecordingInfo>;
}

// Main header field offsets
const NUM_RECORDS: (usize, usize) = (236, 8);
const HEADER_BYTES: (usize, usize) = (184, 8);
const NUM_SIGNALS: (usize, usize) = (252, 4);

// Per-signal field block offsets, in units of `ns` bytes, and widths
const PHYSICAL_MIN: (usize, usize) = (104, 8);
const SAMPLES_PER_RECORD: (usize, usize) = (216, 8);

/// Reads layout and calibration from EDF headers
#[derive(Debug, Clone, Copy, Default)]
pub struct EdfHeaderReader;

impl EdfHeaderReader {
    pub fn new() -> Self {
        Self
    }

    /// Parse a complete header already in memory
    pub fn parse(header: &[u8]) -> Result<RecordingInfo> {
        if header.len() < MAIN_HEADER_BYTES as usize {
            return Err(CompareError::format_mismatch(format!(
                "EDF header too short: {} bytes",
                header.len()
            )));
        }

        let ns: usize = parse_field(header, NUM_SIGNALS.0, NUM_SIGNALS.1, "number of signals")?;
        if ns == 0 {
            return Err(CompareError::format_mismatch("EDF header declares no signals"));
        }

        let expected = header_size(ns);
        if (header.len() as u64) < expected {
            return Err(CompareError::format_mismatch(format!(
                "EDF header truncated: {} of {} bytes",
                header.len(),
                expected
            )));
        }

        let declared_bytes: Option<u64> =
            parse_field(header, HEADER_BYTES.0, HEADER_BYTES.1, "header bytes").ok();
        if declared_bytes.is_some_and(|d| d != expected) {
            tracing::warn!(
                declared = ?declared_bytes,
                expected,
                "EDF header size field disagrees with signal count, using signal count"
            );
        }

        let num_records: i64 = parse_field(header, NUM_RECORDS.0, NUM_RECORDS.1, "number of data records")?;

        let signal_base = MAIN_HEADER_BYTES as usize;
        let mut samples_per_record = Vec::with_capacity(ns);
        for i in 0..ns {
            let offset = signal_base + SAMPLES_PER_RECORD.0 * ns + SAMPLES_PER_RECORD.1 * i;
            let n: u32 = parse_field(header, offset, SAMPLES_PER_RECORD.1, "samples per record")?;
            samples_per_record.push(n);
        }

        let phys_offset = signal_base + PHYSICAL_MIN.0 * ns;
        let physical_minimum: f64 = parse_field(header, phys_offset, PHYSICAL_MIN.1, "physical minimum")?;

        Ok(RecordingInfo {
            num_channels: ns,
            samples_per_record,
            num_records: u64::try_from(num_records).ok(),
            header_size: expected,
            token: CompatibilityToken { physical_minimum },
        })
    }
}

impl RecordingReader for EdfHeaderReader {
    fn read_info(&self, path: &Path) -> Result<RecordingInfo> {
        let mut file = File::open(path).map_err(|e| CompareError::io(path, e))?;

        let mut header = vec![0u8; MAIN_HEADER_BYTES as usize];
        file.read_exact(&mut header)
            .map_err(|e| CompareError::io(path, e))?;

        let ns: usize = parse_field(&header, NUM_SIGNALS.0, NUM_SIGNALS.1, "number of signals")
            .map_err(|e| with_path(e, path))?;
        header.resize(header_size(ns) as usize, 0);
        file.read_exact(&mut header[MAIN_HEADER_BYTES as usize..])
            .map_err(|e| CompareError::io(path, e))?;

        Self::parse(&header).map_err(|e| with_path(e, path))
    }
}

fn with_path(err: CompareError, path: &Path) -> CompareError {
    match err {
        CompareError::FormatMismatch { reason } => {
            CompareError::format_mismatch(format!("{}: {}", path.display(), reason))
        }
        other => other,
    }
}

fn parse_field<T: std::str::FromStr>(
    header: &[u8],
    offset: usize,
    width: usize,
    name: &str,
) -> Result<T> {
    let raw = header
        .get(offset..offset + width)
        .ok_or_else(|| CompareError::format_mismatch(format!("EDF field '{}' out of range", name)))?;
    let text = std::str::from_utf8(raw)
        .map_err(|_| CompareError::format_mismatch(format!("EDF field '{}' is not ASCII", name)))?
        .trim();
    text.parse().map_err(|_| {
        CompareError::format_mismatch(format!("EDF field '{}' has invalid value '{}'", name, text))
    })
}

fn put_field(buf: &mut [u8], offset: usize, width: usize, value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(width);
    buf[offset..offset + n].copy_from_slice(&bytes[..n]);
}

/// Encode a minimal EDF header for the given layout
///
/// Unused text fields are left blank; digital range is the full i16 range.
pub fn encode_edf_header(samples_per_record: &[u32], num_records: u64, physical_minimum: f64) -> Vec<u8> {
    let ns = samples_per_record.len();
    let size = header_size(ns) as usize;
    let mut buf = vec![b' '; size];

    put_field(&mut buf, 0, 8, "0");
    put_field(&mut buf, 168, 8, "01.01.25");
    put_field(&mut buf, 176, 8, "00.00.00");
    put_field(&mut buf, HEADER_BYTES.0, HEADER_BYTES.1, &size.to_string());
    put_field(&mut buf, NUM_RECORDS.0, NUM_RECORDS.1, &num_records.to_string());
    put_field(&mut buf, 244, 8, "1");
    put_field(&mut buf, NUM_SIGNALS.0, NUM_SIGNALS.1, &ns.to_string());

    let base = MAIN_HEADER_BYTES as usize;
    let physical_max = physical_minimum.abs().max(1.0);
    for (i, &n) in samples_per_record.iter().enumerate() {
        put_field(&mut buf, base + 16 * i, 16, &format!("CH{}", i));
        put_field(&mut buf, base + 96 * ns + 8 * i, 8, "uV");
        put_field(&mut buf, base + PHYSICAL_MIN.0 * ns + 8 * i, 8, &physical_minimum.to_string());
        put_field(&mut buf, base + 112 * ns + 8 * i, 8, &physical_max.to_string());
        put_field(&mut buf, base + 120 * ns + 8 * i, 8, &i16::MIN.to_string());
        put_field(&mut buf, base + 128 * ns + 8 * i, 8, &i16::MAX.to_string());
        put_field(&mut buf, base + SAMPLES_PER_RECORD.0 * ns + 8 * i, 8, &n.to_string());
    }
    buf
}
