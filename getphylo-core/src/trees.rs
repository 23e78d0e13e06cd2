//! Tree building from the combined alignment

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::checkpoint::{Checkpoint, Stage};
use crate::combine::list_marker_alignments;
use crate::error::{GetphyloError, Result};
use crate::layout::OutputLayout;
use crate::pool::WorkerPool;
use crate::tools::{ToolInvocation, ToolRunner};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeMethod {
    #[default]
    FastTree,
    IqTree,
}

impl TreeMethod {
    pub fn name(self) -> &'static str {
        match self {
            TreeMethod::FastTree => "fasttree",
            TreeMethod::IqTree => "iqtree",
        }
    }
}

impl fmt::Display for TreeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TreeMethod {
    type Err = GetphyloError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fasttree" => Ok(TreeMethod::FastTree),
            "iqtree" | "iqtree2" => Ok(TreeMethod::IqTree),
            other => Err(GetphyloError::config(format!(
                "Unknown tree method '{}'. Available methods: fasttree, iqtree",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeOptions {
    pub method: TreeMethod,
    /// Also build one tree per marker alignment
    pub build_all: bool,
    pub threads: usize,
}

fn tree_invocation(
    layout: &OutputLayout,
    options: &TreeOptions,
    name: &str,
    alignment: PathBuf,
    partitioned: bool,
    threads: usize,
) -> ToolInvocation {
    match options.method {
        TreeMethod::FastTree => ToolInvocation::FastTree {
            alignment,
            output: layout.trees_dir().join(format!("{}.tree", name)),
        },
        TreeMethod::IqTree => ToolInvocation::IqTree {
            alignment,
            partition: partitioned.then(|| layout.partition()),
            prefix: layout.trees_dir().join(name),
            threads,
        },
    }
}

/// Build the combined tree, then per-marker trees when requested
pub fn build_trees(
    layout: &OutputLayout,
    options: &TreeOptions,
    checkpoint: &Checkpoint,
    pool: &WorkerPool,
    runner: &dyn ToolRunner,
) -> Result<()> {
    let trees_dir = layout.trees_dir();
    if trees_dir.exists() {
        return Err(GetphyloError::already_exists(&trees_dir, Stage::AlignmentsCombined));
    }

    let combined = layout.combined_alignment();
    checkpoint.require(&combined, Stage::AlignmentsCombined)?;
    if options.method == TreeMethod::IqTree {
        checkpoint.require(layout.partition(), Stage::AlignmentsCombined)?;
    }
    layout.ensure_dir(&trees_dir)?;

    log::info!("Building the combined tree with {}", options.method);
    runner.run(&tree_invocation(
        layout,
        options,
        "combined_alignment",
        combined,
        true,
        options.threads,
    ))?;

    if options.build_all {
        let markers = list_marker_alignments(layout)?;
        log::info!("Building {} single-marker trees", markers.len());
        let jobs = markers
            .into_iter()
            .map(|(marker, path)| tree_invocation(layout, options, &marker, path, false, 1))
            .collect();
        pool.run_tools(runner, jobs)?;
    }

    Ok(())
}
