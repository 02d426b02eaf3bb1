//! Bounded scatter summary of a mismatch stream
//!
//! Keeps at most one record per (channel, time bin): the one with the
//! strictly largest difference, first seen wins on ties. Slots live in a
//! fixed `channels x bins` index array pointing into a record arena, so the
//! output size never depends on how many mismatches were offered.

use crate::chunked_diff::MismatchRecord;

const EMPTY: u32 = u32::MAX;

pub struct VisualizationBinner {
    num_channels: usize,
    bins_per_channel: usize,
    bin_width: u64,
    /// `channel * bins_per_channel + bin` -> index into `arena`
    slots: Vec<u32>,
    arena: Vec<MismatchRecord>,
    offered: u64,
}

impl VisualizationBinner {
    /// `bin_width = max(1, max_samples_per_channel / target_bin_count)`
    pub fn new(num_channels: usize, max_samples_per_channel: u64, target_bin_count: usize) -> Self {
        let bins_per_channel = target_bin_count.max(1);
        let bin_width = (max_samples_per_channel / bins_per_channel as u64).max(1);
        Self {
            num_channels,
            bins_per_channel,
            bin_width,
            slots: vec![EMPTY; num_channels * bins_per_channel],
            arena: Vec::new(),
            offered: 0,
        }
    }

    pub fn bin_width(&self) -> u64 {
        self.bin_width
    }

    /// Upper bound on retained records
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Records offered so far (retained or not)
    pub fn offered(&self) -> u64 {
        self.offered
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    #[inline]
    fn slot_of(&self, record: &MismatchRecord) -> Option<usize> {
        let channel = record.channel as usize;
        if channel >= self.num_channels {
            return None;
        }
        // Rounding in bin_width can leave a short tail past the last bin
        let bin = ((record.sample_index / self.bin_width) as usize).min(self.bins_per_channel - 1);
        Some(channel * self.bins_per_channel + bin)
    }

    pub fn offer(&mut self, record: &MismatchRecord) {
        self.offered += 1;
        let Some(slot) = self.slot_of(record) else {
            tracing::debug!(channel = record.channel, "mismatch outside binner channel range");
            return;
        };

        match self.slots[slot] {
            EMPTY => {
                self.slots[slot] = self.arena.len() as u32;
                self.arena.push(*record);
            }
            idx => {
                let kept = &mut self.arena[idx as usize];
                if record.abs_diff > kept.abs_diff {
                    *kept = *record;
                }
            }
        }
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a MismatchRecord>) {
        for record in records {
            self.offer(record);
        }
    }

    /// Retained records ordered by channel, then time bin
    pub fn into_records(self) -> Vec<MismatchRecord> {
        self.slots
            .iter()
            .filter(|&&idx| idx != EMPTY)
            .map(|&idx| self.arena[idx as usize])
            .collect()
    }
}
