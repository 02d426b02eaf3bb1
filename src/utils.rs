//! File discovery and naming helpers

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// List recordings with the given extension in `dir`, sorted by path
pub fn discover_recordings(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.');
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read recordings directory: {}", dir.display()))?
    {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(wanted))
            .unwrap_or(false);
        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Name used in tables and artifact file names (file stem)
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Names for a set of recordings, unique within the set
///
/// The file stem is used unless another file shares it (`x.edf` and
/// `x.EDF`), in which case the full file name is kept so artifacts keyed
/// by name do not overwrite each other.
pub fn display_names(paths: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|p| display_name(p)).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }

    paths
        .iter()
        .zip(&stems)
        .map(|(path, stem)| {
            if counts[stem.as_str()] > 1 {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| stem.clone())
            } else {
                stem.clone()
            }
        })
        .collect()
}
