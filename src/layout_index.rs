//! Record layout index
//!
//! Maps a flat sample index (offset into the concatenation of every record)
//! to its (channel, sample-within-channel) coordinate. One record is the
//! concatenation of per-channel blocks, so two tables of `record_length`
//! entries resolve any offset inside a record in O(1).

use crate::coordinate::Coordinate;
use crate::error::{CompareError, Result};

/// Lookup tables for one record layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutTables {
    /// Samples per record for each channel
    samples_per_channel: Vec<u32>,
    /// Offset of each channel's block inside a record
    channel_start: Vec<u32>,
    /// Channel owning each offset in a record
    channel_of: Vec<u32>,
    /// Position inside the owning channel's block for each offset
    sample_offset_of: Vec<u32>,
    record_length: u64,
}

impl LayoutTables {
    /// Build tables from per-channel samples-per-record counts
    pub fn build(per_channel_counts: &[u32]) -> Result<Self> {
        if per_channel_counts.is_empty() {
            return Err(CompareError::invalid_layout("layout has no channels"));
        }
        if let Some(ch) = per_channel_counts.iter().position(|&n| n == 0) {
            return Err(CompareError::invalid_layout(format!(
                "channel {} has zero samples per record",
                ch
            )));
        }

        let record_length: u64 = per_channel_counts.iter().map(|&n| n as u64).sum();
        if record_length > u32::MAX as u64 {
            return Err(CompareError::invalid_layout(format!(
                "record length {} exceeds the addressable table size",
                record_length
            )));
        }

        let mut channel_start = Vec::with_capacity(per_channel_counts.len());
        let mut channel_of = table_with_capacity(record_length)?;
        let mut sample_offset_of = table_with_capacity(record_length)?;

        let mut cursor = 0u32;
        for (ch, &n_samples) in per_channel_counts.iter().enumerate() {
            channel_start.push(cursor);
            channel_of.extend(std::iter::repeat(ch as u32).take(n_samples as usize));
            sample_offset_of.extend(0..n_samples);
            cursor += n_samples;
        }

        Ok(Self {
            samples_per_channel: per_channel_counts.to_vec(),
            channel_start,
            channel_of,
            sample_offset_of,
            record_length,
        })
    }

    /// Build tables for a recording holding `total_samples` samples
    ///
    /// The data region holds whole records, so a layout longer than the
    /// recording itself comes from a corrupt header and is rejected before
    /// any table is allocated.
    pub fn build_for_recording(per_channel_counts: &[u32], total_samples: u64) -> Result<Self> {
        let record_length: u64 = per_channel_counts.iter().map(|&n| n as u64).sum();
        if record_length > total_samples {
            return Err(CompareError::invalid_layout(format!(
                "record length {} exceeds the {} samples in the recording",
                record_length, total_samples
            )));
        }
        Self::build(per_channel_counts)
    }

    pub fn record_length(&self) -> u64 {
        self.record_length
    }

    pub fn num_channels(&self) -> usize {
        self.samples_per_channel.len()
    }

    pub fn samples_per_channel(&self) -> &[u32] {
        &self.samples_per_channel
    }

    /// Resolve a flat sample index to its coordinate
    #[inline]
    pub fn locate(&self, flat_index: u64) -> Coordinate {
        let record_index = flat_index / self.record_length;
        let offset_in_record = (flat_index % self.record_length) as usize;

        let channel = self.channel_of[offset_in_record];
        let local_offset = self.sample_offset_of[offset_in_record] as u64;
        let per_record = self.samples_per_channel[channel as usize] as u64;

        Coordinate {
            channel,
            sample_index: record_index * per_record + local_offset,
        }
    }

    /// Inverse of [`locate`](Self::locate); `None` for an unknown channel
    pub fn flat_index(&self, coordinate: Coordinate) -> Option<u64> {
        let ch = coordinate.channel as usize;
        let per_record = *self.samples_per_channel.get(ch)? as u64;

        let record_index = coordinate.sample_index / per_record;
        let local_offset = coordinate.sample_index % per_record;
        let offset_in_record = self.channel_start[ch] as u64 + local_offset;

        Some(record_index * self.record_length + offset_in_record)
    }

    /// Longest channel (in samples) for a recording holding `total_samples`
    pub fn max_samples_per_channel(&self, total_samples: u64) -> u64 {
        let full_records = total_samples / self.record_length;
        let widest = self.samples_per_channel.iter().copied().max().unwrap_or(0) as u64;
        full_records * widest
    }
}

fn table_with_capacity(len: u64) -> Result<Vec<u32>> {
    let mut table = Vec::new();
    table.try_reserve_exact(len as usize).map_err(|e| {
        CompareError::invalid_layout(format!("cannot allocate {} table entries: {}", len, e))
    })?;
    Ok(table)
}
