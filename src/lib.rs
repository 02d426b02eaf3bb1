//! edf-parity - Sample-level parity checking for EDF recordings
//!
//! Compares recordings produced by different processing pipelines (for
//! example a sequential and a GPU preprocessing run) sample by sample, and
//! reports where and by how much they diverge. Files are memory mapped and
//! walked in fixed-size windows, so recordings larger than RAM are fine.

pub mod binner;
pub mod chunked_diff;
pub mod config;
pub mod coordinate;
pub mod differential;
pub mod error;
pub mod layout_index;
pub mod parallel_differential;
pub mod recording;
pub mod sink;
/// Synthetic recordings for tests, benches and experiments
pub mod synth;
/// Discovery and naming helpers
pub mod utils;

pub use chunked_diff::{ChunkedDiffer, MismatchRecord, PairSummary};
pub use config::{BatchConfig, CompareConfig};
pub use coordinate::Coordinate;
pub use differential::{compare_files, compare_pair, CancelToken, PairJob, PairOutcome, PairResult};
pub use error::{CompareError, ErrorTag};
pub use layout_index::LayoutTables;
pub use parallel_differential::{run_batch, run_pairs, BatchReport, BatchStatus};
pub use recording::{EdfHeaderReader, RecordingInfo, RecordingReader};

use tracing_subscriber::EnvFilter;

/// Initialize logging to stderr; `RUST_LOG` overrides the default level
pub fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
