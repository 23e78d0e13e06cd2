//! Pipeline stages and resume gating
//!
//! A run is resumed by naming the last stage that completed. Each pipeline
//! step is tagged with the stage it finishes; the step executes only when the
//! resume point lies strictly before that stage. Nothing here inspects the
//! filesystem to decide where a run stands: artifact checks are only used to
//! confirm that a skipped step left behind what the next step reads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GetphyloError, Result};

/// Ordered pipeline milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Start,
    SequencesExtracted,
    DatabasesBuilt,
    MarkersIdentified,
    MarkersSearched,
    MarkersThresholded,
    MarkersExtracted,
    MarkersAligned,
    AlignmentsCombined,
    TreesBuilt,
    Done,
}

impl Stage {
    pub const ALL: [Stage; 11] = [
        Stage::Start,
        Stage::SequencesExtracted,
        Stage::DatabasesBuilt,
        Stage::MarkersIdentified,
        Stage::MarkersSearched,
        Stage::MarkersThresholded,
        Stage::MarkersExtracted,
        Stage::MarkersAligned,
        Stage::AlignmentsCombined,
        Stage::TreesBuilt,
        Stage::Done,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Start => "START",
            Stage::SequencesExtracted => "SEQUENCES_EXTRACTED",
            Stage::DatabasesBuilt => "DATABASES_BUILT",
            Stage::MarkersIdentified => "MARKERS_IDENTIFIED",
            Stage::MarkersSearched => "MARKERS_SEARCHED",
            Stage::MarkersThresholded => "MARKERS_THRESHOLDED",
            Stage::MarkersExtracted => "MARKERS_EXTRACTED",
            Stage::MarkersAligned => "MARKERS_ALIGNED",
            Stage::AlignmentsCombined => "ALIGNMENTS_COMBINED",
            Stage::TreesBuilt => "TREES_BUILT",
            Stage::Done => "DONE",
        }
    }

    /// The stage immediately before this one, used in restart hints
    pub fn previous(self) -> Stage {
        let index = Stage::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Stage::ALL[index.saturating_sub(1)]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = GetphyloError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        if let Some(stage) = Stage::ALL.iter().find(|stage| stage.name() == normalized) {
            return Ok(*stage);
        }

        // Names used by earlier releases of the tool
        let legacy = match normalized.as_str() {
            "FASTA_EXTRACTED" => Some(Stage::SequencesExtracted),
            "DIAMOND_BUILT" => Some(Stage::DatabasesBuilt),
            "SINGLETONS_IDENTIFIED" => Some(Stage::MarkersIdentified),
            "SINGLETONS_SEARCHED" => Some(Stage::MarkersSearched),
            "SINGLETONS_THRESHOLDED" => Some(Stage::MarkersThresholded),
            "SINGLETONS_EXTRACTED" => Some(Stage::MarkersExtracted),
            "SINGLETONS_ALIGNED" => Some(Stage::MarkersAligned),
            _ => None,
        };

        legacy.ok_or_else(|| {
            let names: Vec<&str> = Stage::ALL.iter().map(|stage| stage.name()).collect();
            GetphyloError::config(format!(
                "Unknown stage '{}'. Available stages: {}",
                s,
                names.join(", ")
            ))
        })
    }
}

/// Resume point supplied by the user, compared against each step's stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    resume: Stage,
}

impl Checkpoint {
    pub fn new(resume: Stage) -> Self {
        Self { resume }
    }

    pub fn resume(&self) -> Stage {
        self.resume
    }

    /// True when the step that completes `stage` has to execute
    pub fn should_run(&self, stage: Stage) -> bool {
        self.resume < stage
    }

    pub fn is_resuming(&self) -> bool {
        self.resume > Stage::Start
    }

    /// Log that the pipeline has passed `stage`, whether it ran or was skipped
    pub fn reached(&self, stage: Stage) {
        log::info!("CHECKPOINT: {}", stage);
    }

    /// Confirm that a skipped step left `path` behind for the step that needs it
    pub fn require<P: AsRef<Path>>(&self, path: P, produced_by: Stage) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            Ok(())
        } else {
            Err(GetphyloError::missing_prerequisite(
                produced_by,
                path,
                format!(
                    "expected output of a previous run; resume from {} or earlier",
                    produced_by.previous()
                ),
            ))
        }
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new(Stage::Start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stages_are_totally_ordered() {
        for pair in Stage::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_parse_stage_names() {
        assert_eq!("markers_searched".parse::<Stage>().unwrap(), Stage::MarkersSearched);
        assert_eq!("ALIGNMENTS-COMBINED".parse::<Stage>().unwrap(), Stage::AlignmentsCombined);
        assert_eq!("Start".parse::<Stage>().unwrap(), Stage::Start);
        assert!("step7".parse::<Stage>().is_err());
    }

    #[test]
    fn test_parse_legacy_names() {
        assert_eq!("diamond_built".parse::<Stage>().unwrap(), Stage::DatabasesBuilt);
        assert_eq!("SINGLETONS_THRESHOLDED".parse::<Stage>().unwrap(), Stage::MarkersThresholded);
    }

    #[test]
    fn test_gating_skips_completed_steps() {
        let checkpoint = Checkpoint::new(Stage::MarkersThresholded);
        assert!(!checkpoint.should_run(Stage::SequencesExtracted));
        assert!(!checkpoint.should_run(Stage::MarkersThresholded));
        assert!(checkpoint.should_run(Stage::MarkersExtracted));
        assert!(checkpoint.should_run(Stage::TreesBuilt));
        assert!(checkpoint.is_resuming());

        let fresh = Checkpoint::default();
        assert!(Stage::ALL[1..].iter().all(|s| fresh.should_run(*s)));
        assert!(!fresh.is_resuming());
    }

    #[test]
    fn test_require_reports_missing_prerequisite() {
        let dir = tempdir().unwrap();
        let checkpoint = Checkpoint::new(Stage::MarkersThresholded);
        let missing = dir.path().join("final_loci.txt");

        let err = checkpoint.require(&missing, Stage::MarkersThresholded).unwrap_err();
        assert_eq!(err.kind(), "MissingPrerequisite");
        assert!(err.to_string().contains("MARKERS_SEARCHED"));

        std::fs::write(&missing, "locus_1\n").unwrap();
        assert!(checkpoint.require(&missing, Stage::MarkersThresholded).is_ok());
    }

    #[test]
    fn test_previous_stage() {
        assert_eq!(Stage::Start.previous(), Stage::Start);
        assert_eq!(Stage::MarkersAligned.previous(), Stage::MarkersExtracted);
    }
}
