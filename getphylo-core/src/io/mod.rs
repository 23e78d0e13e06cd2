//! File formats read and written by the pipeline
//!
//! FASTA collections, tab-delimited search tables and plain marker lists,
//! plus the directory listing helpers the stages use to find their inputs.

pub mod fasta;
pub mod hits;
pub mod lists;

pub use fasta::SequenceStore;
pub use hits::read_hits;
pub use lists::{create_list, read_list, write_list};

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Files in `dir` with the given extension, sorted by path for a stable order
pub fn list_files_with_extension<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == extension).unwrap_or(false) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
    Ok(paths)
}

/// File stem as an owned string (`aligned_fasta/locus_7.fasta` -> `locus_7`)
pub fn file_stem_string<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_files_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["c.tsv", "a.tsv", "b.txt", "d.fasta"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("nested.tsv")).unwrap();

        let found = list_files_with_extension(dir.path(), "tsv").unwrap();
        let names: Vec<String> = found.iter().map(file_stem_string).collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
