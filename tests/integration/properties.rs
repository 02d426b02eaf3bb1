//! Property tests: coordinate round-trip and window-size invariance

use crate::helpers::{config_with_window, write_edf};
use edf_parity::differential::compare_files;
use edf_parity::recording::EdfHeaderReader;
use edf_parity::LayoutTables;
use proptest::prelude::*;
use tempfile::TempDir;

fn arb_layout() -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::vec(1u32..40, 1..8)
}

proptest! {
    /// Property: flat -> coordinate -> flat recovers the flat index
    #[test]
    fn prop_coordinate_round_trip(layout in arb_layout(), flat in 0u64..1_000_000) {
        let tables = LayoutTables::build(&layout).unwrap();
        let coordinate = tables.locate(flat);
        prop_assert!((coordinate.channel as usize) < layout.len());
        prop_assert_eq!(tables.flat_index(coordinate), Some(flat));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: summary and mismatch set do not depend on the window size
    #[test]
    fn prop_window_size_invariance(
        base in proptest::collection::vec(any::<i16>(), 210),
        edits in proptest::collection::vec((0usize..210, any::<i16>()), 0..20),
        window in 1usize..260,
        threshold in 0u16..3000,
    ) {
        let dir = TempDir::new().unwrap();
        let mut other = base.clone();
        for (i, value) in edits {
            other[i] = value;
        }
        let layout = [4, 2, 1];
        let a = write_edf(dir.path(), "a", &layout, &base);
        let b = write_edf(dir.path(), "b", &layout, &other);
        let reader = EdfHeaderReader::new();

        let mut whole = config_with_window(1024);
        whole.error_threshold = threshold;
        let mut windowed = config_with_window(window);
        windowed.error_threshold = threshold;

        let (expected, expected_records) = compare_files(&a, &b, &reader, &whole).unwrap();
        let (summary, records) = compare_files(&a, &b, &reader, &windowed).unwrap();
        prop_assert_eq!(summary, expected);
        prop_assert_eq!(records, expected_records);
        prop_assert_eq!(summary.match_count + summary.mismatch_count, 210);
    }
}
