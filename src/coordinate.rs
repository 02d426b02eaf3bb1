//! Flat index -> (channel, sample) resolution for mismatch batches

use crate::layout_index::LayoutTables;
use serde::{Deserialize, Serialize};

/// Logical position of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub channel: u32,
    /// Sample index within the channel, counted from the start of the recording
    pub sample_index: u64,
}

/// Resolve a batch of flat indices, preserving input order
pub fn resolve(flat_indices: &[u64], tables: &LayoutTables) -> Vec<Coordinate> {
    flat_indices.iter().map(|&f| tables.locate(f)).collect()
}

/// Resolve chunk-local indices of a window starting at `window_start`
///
/// Appends to `out` in input order.
pub fn resolve_window(
    window_start: u64,
    local_indices: &[u32],
    tables: &LayoutTables,
    out: &mut Vec<Coordinate>,
) {
    out.reserve(local_indices.len());
    out.extend(
        local_indices
            .iter()
            .map(|&local| tables.locate(window_start + local as u64)),
    );
}
