use std::{
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::error::Result;

const COVERED_MARKERS: [char; 2] = ['*', 'e'];

/// Count covered lines in a `covered.<timestamp>.txt` report, where
/// covered source lines start with `*` (or `e` for covered-with-error).
pub(crate) fn count_cov_lines(coverage_file: &Path) -> Result<usize> {
    let reader = BufReader::new(std::fs::File::open(coverage_file)?);
    let mut covered = 0;
    for line in reader.lines() {
        if line?.starts_with(COVERED_MARKERS) {
            covered += 1;
        }
    }
    Ok(covered)
}

/// The newest `covered.*.txt` file in `corpus_dir`, by name.
pub(crate) fn latest_coverage_file(corpus_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(corpus_dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("covered.") && name.ends_with(".txt")
        })
        .map(|entry| entry.path())
        .max()
}
