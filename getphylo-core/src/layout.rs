//! Canonical artifact paths under one output directory

use std::path::{Path, PathBuf};

use crate::error::Result;

pub const COMBINED_ALIGNMENT: &str = "combined_alignment.fasta";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fasta_dir(&self) -> PathBuf {
        self.root.join("fasta")
    }

    pub fn organism_fasta(&self, organism: &str) -> PathBuf {
        self.fasta_dir().join(format!("{}.fasta", organism))
    }

    /// Inputs left out under `--ignore-bad-records`
    pub fn skipped_organisms(&self) -> PathBuf {
        self.fasta_dir().join("skipped_organisms.txt")
    }

    pub fn dmnd_dir(&self) -> PathBuf {
        self.root.join("dmnd")
    }

    pub fn organism_database(&self, organism: &str) -> PathBuf {
        self.dmnd_dir().join(format!("{}.dmnd", organism))
    }

    /// Seed self-search and candidate lists
    pub fn tsv_dir(&self) -> PathBuf {
        self.root.join("tsv")
    }

    pub fn seed_hits(&self, seed: &str) -> PathBuf {
        self.tsv_dir().join(format!("{}.tsv", seed))
    }

    pub fn candidate_loci(&self) -> PathBuf {
        self.tsv_dir().join("candidate_loci.txt")
    }

    pub fn candidate_fasta(&self) -> PathBuf {
        self.tsv_dir().join("candidate_loci.fasta")
    }

    /// Candidate searches against every organism
    pub fn tsvs_dir(&self) -> PathBuf {
        self.root.join("tsvs")
    }

    pub fn organism_hits(&self, organism: &str) -> PathBuf {
        self.tsvs_dir().join(format!("{}.tsv", organism))
    }

    pub fn thresholding_data(&self) -> PathBuf {
        self.root.join("thresholding_data.csv")
    }

    pub fn presence_absence_table(&self) -> PathBuf {
        self.root.join("presence_absence_table.csv")
    }

    pub fn final_loci(&self) -> PathBuf {
        self.root.join("final_loci.txt")
    }

    pub fn unaligned_dir(&self) -> PathBuf {
        self.root.join("unaligned_fasta")
    }

    pub fn unaligned_marker(&self, marker: &str) -> PathBuf {
        self.unaligned_dir().join(format!("{}.fasta", marker))
    }

    pub fn aligned_dir(&self) -> PathBuf {
        self.root.join("aligned_fasta")
    }

    pub fn aligned_marker(&self, marker: &str) -> PathBuf {
        self.aligned_dir().join(format!("{}.fasta", marker))
    }

    pub fn combined_alignment(&self) -> PathBuf {
        self.aligned_dir().join(COMBINED_ALIGNMENT)
    }

    pub fn partition(&self) -> PathBuf {
        self.root.join("partition.txt")
    }

    pub fn combined_presence_absence(&self) -> PathBuf {
        self.root.join("combined_presence_absence.csv")
    }

    pub fn combine_summary(&self) -> PathBuf {
        self.root.join("combine_summary.json")
    }

    pub fn trees_dir(&self) -> PathBuf {
        self.root.join("trees")
    }

    pub fn ensure_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        Ok(())
    }
}
