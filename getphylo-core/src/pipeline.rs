//! Sequential, checkpointed pipeline
//!
//! Stages run strictly in order. Each step is gated on the resume stage; a
//! skipped step's artifacts are read back from the output directory by the
//! next step that needs them, failing with `MissingPrerequisite` if they are
//! gone.

use std::path::PathBuf;

use crate::align::{align_markers, extract_markers};
use crate::checkpoint::{Checkpoint, Stage};
use crate::combine::{combine_alignments, Reconciliation, DEFAULT_PARTITION_MODEL};
use crate::error::{GetphyloError, Result};
use crate::extract::{build_databases, extract_sequences, ExtractOptions};
use crate::layout::OutputLayout;
use crate::organism::{discover_organisms, load_extracted, resolve_seed};
use crate::pool::WorkerPool;
use crate::screen::{
    find_candidates, load_candidates, load_final_markers, search_candidates, threshold_markers,
    Thresholds,
};
use crate::tools::{SearchParams, ToolRunner};
use crate::trees::{build_trees, TreeOptions};
use crate::types::MarkerId;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Glob matching the input organisms
    pub inputs: String,
    pub output: PathBuf,
    pub seed: Option<String>,
    pub resume: Stage,
    pub cpus: usize,
    pub random_seed: Option<u64>,
    pub thresholds: Thresholds,
    pub search: SearchParams,
    pub extract: ExtractOptions,
    pub trees: TreeOptions,
    pub partition_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: "*.fasta".to_string(),
            output: PathBuf::from("output"),
            seed: None,
            resume: Stage::Start,
            cpus: 1,
            random_seed: None,
            thresholds: Thresholds::default(),
            search: SearchParams::default(),
            extract: ExtractOptions::default(),
            trees: TreeOptions::default(),
            partition_model: DEFAULT_PARTITION_MODEL.to_string(),
        }
    }
}

/// What a run produced, for callers that want more than the files
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub seed: String,
    pub organisms: Vec<String>,
    pub markers: Option<Vec<MarkerId>>,
    pub reconciliation: Option<Reconciliation>,
}

pub fn run(config: &PipelineConfig, runner: &dyn ToolRunner) -> Result<PipelineReport> {
    let checkpoint = Checkpoint::new(config.resume);
    let layout = OutputLayout::new(&config.output);
    let pool = WorkerPool::new(config.cpus)?;

    let organisms = discover_organisms(&config.inputs)?;
    let seed = resolve_seed(&organisms, config.seed.as_deref(), &checkpoint)?.clone();
    log::info!("The seed organism is {}", seed.name);

    if layout.root().exists() {
        log::info!("Continuing in existing output directory {}", layout.root().display());
    }
    layout.ensure_dir(layout.root())?;
    if checkpoint.is_resuming() {
        log::info!("Resuming after {}", checkpoint.resume());
    }

    let active = if checkpoint.should_run(Stage::SequencesExtracted) {
        extract_sequences(&layout, &organisms, config.extract)?
    } else {
        load_extracted(&layout, &organisms, &checkpoint)?
    };
    checkpoint.reached(Stage::SequencesExtracted);

    if checkpoint.should_run(Stage::DatabasesBuilt) {
        build_databases(&layout, &active, &pool, runner)?;
    }
    checkpoint.reached(Stage::DatabasesBuilt);

    let mut candidates = None;
    if checkpoint.should_run(Stage::MarkersIdentified) {
        if !active.iter().any(|organism| organism.name == seed.name) {
            return Err(GetphyloError::bad_seed(format!(
                "no sequences were extracted for the seed organism {}",
                seed.name
            )));
        }
        candidates = Some(find_candidates(
            &layout,
            &seed,
            &config.thresholds,
            config.random_seed,
            &checkpoint,
            runner,
        )?);
    }
    checkpoint.reached(Stage::MarkersIdentified);

    if checkpoint.should_run(Stage::MarkersSearched) {
        search_candidates(&layout, &active, &config.search, &checkpoint, &pool, runner)?;
    }
    checkpoint.reached(Stage::MarkersSearched);

    let mut markers = None;
    if checkpoint.should_run(Stage::MarkersThresholded) {
        let candidates = match candidates {
            Some(candidates) => candidates,
            None => load_candidates(&layout, &checkpoint)?,
        };
        markers = Some(threshold_markers(
            &layout,
            &active,
            &candidates,
            &config.thresholds,
            &checkpoint,
        )?);
    }
    checkpoint.reached(Stage::MarkersThresholded);

    if checkpoint.should_run(Stage::MarkersAligned) {
        let final_markers = match markers.take() {
            Some(markers) => markers,
            None => load_final_markers(&layout, &checkpoint)?,
        };

        if checkpoint.should_run(Stage::MarkersExtracted) {
            extract_markers(&layout, &active, &final_markers, &checkpoint)?;
        }
        checkpoint.reached(Stage::MarkersExtracted);

        align_markers(&layout, &final_markers, &checkpoint, &pool, runner)?;
        markers = Some(final_markers);
    } else {
        checkpoint.reached(Stage::MarkersExtracted);
    }
    checkpoint.reached(Stage::MarkersAligned);

    let mut reconciliation = None;
    if checkpoint.should_run(Stage::AlignmentsCombined) {
        reconciliation = Some(combine_alignments(
            &layout,
            &organisms,
            &config.partition_model,
            &checkpoint,
        )?);
    }
    checkpoint.reached(Stage::AlignmentsCombined);

    if checkpoint.should_run(Stage::TreesBuilt) {
        let options = TreeOptions {
            threads: config.cpus,
            ..config.trees.clone()
        };
        build_trees(&layout, &options, &checkpoint, &pool, runner)?;
    }
    checkpoint.reached(Stage::TreesBuilt);
    checkpoint.reached(Stage::Done);
    log::info!("Analysis complete");

    Ok(PipelineReport {
        seed: seed.name,
        organisms: active.into_iter().map(|organism| organism.name).collect(),
        markers,
        reconciliation,
    })
}
