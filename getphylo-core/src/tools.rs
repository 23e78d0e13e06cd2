//! External programs driven by the pipeline
//!
//! DIAMOND, MUSCLE, FastTree and IQ-TREE are treated as pure functions over
//! file paths: each [`ToolInvocation`] names its inputs and the single output
//! it writes. [`ToolRunner`] is the seam where tests substitute an in-process
//! implementation for the real binaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use crate::error::{GetphyloError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Diamond,
    Muscle,
    FastTree,
    IqTree,
}

impl Tool {
    /// Executable names tried on `PATH`, in order
    pub fn default_executables(self) -> &'static [&'static str] {
        match self {
            Tool::Diamond => &["diamond"],
            Tool::Muscle => &["muscle"],
            Tool::FastTree => &["fasttree", "FastTree"],
            Tool::IqTree => &["iqtree2", "iqtree"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tool::Diamond => "diamond",
            Tool::Muscle => "muscle",
            Tool::FastTree => "fasttree",
            Tool::IqTree => "iqtree",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional DIAMOND blastp cutoffs; unset values leave DIAMOND's defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub identity: Option<f64>,
    pub query_cover: Option<f64>,
    pub subject_cover: Option<f64>,
}

impl SearchParams {
    pub fn to_diamond_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity) = self.identity {
            args.push("--id".to_string());
            args.push(identity.to_string());
        }

        if let Some(cover) = self.query_cover {
            args.push("--query-cover".to_string());
            args.push(cover.to_string());
        }

        if let Some(cover) = self.subject_cover {
            args.push("--subject-cover".to_string());
            args.push(cover.to_string());
        }

        args
    }
}

/// One self-contained unit of external work
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    MakeDatabase {
        input: PathBuf,
        database: PathBuf,
    },
    Search {
        query: PathBuf,
        database: PathBuf,
        output: PathBuf,
        params: SearchParams,
    },
    Align {
        input: PathBuf,
        output: PathBuf,
    },
    FastTree {
        alignment: PathBuf,
        output: PathBuf,
    },
    /// IQ-TREE writes `<prefix>.treefile` and friends
    IqTree {
        alignment: PathBuf,
        partition: Option<PathBuf>,
        prefix: PathBuf,
        threads: usize,
    },
}

impl ToolInvocation {
    pub fn tool(&self) -> Tool {
        match self {
            ToolInvocation::MakeDatabase { .. } | ToolInvocation::Search { .. } => Tool::Diamond,
            ToolInvocation::Align { .. } => Tool::Muscle,
            ToolInvocation::FastTree { .. } => Tool::FastTree,
            ToolInvocation::IqTree { .. } => Tool::IqTree,
        }
    }

    /// Command-line arguments, without the executable
    pub fn args(&self) -> Vec<String> {
        match self {
            ToolInvocation::MakeDatabase { input, database } => vec![
                "makedb".to_string(),
                "--in".to_string(),
                path_arg(input),
                "--db".to_string(),
                path_arg(database),
            ],
            ToolInvocation::Search {
                query,
                database,
                output,
                params,
            } => {
                let mut args = vec![
                    "blastp".to_string(),
                    "--db".to_string(),
                    path_arg(database),
                    "--query".to_string(),
                    path_arg(query),
                    "--out".to_string(),
                    path_arg(output),
                    "--outfmt".to_string(),
                    "6".to_string(),
                    "qseqid".to_string(),
                    "sseqid".to_string(),
                    "pident".to_string(),
                ];
                args.extend(params.to_diamond_args());
                args
            }
            ToolInvocation::Align { input, output } => vec![
                "-in".to_string(),
                path_arg(input),
                "-out".to_string(),
                path_arg(output),
            ],
            ToolInvocation::FastTree { alignment, output } => {
                vec!["-out".to_string(), path_arg(output), path_arg(alignment)]
            }
            ToolInvocation::IqTree {
                alignment,
                partition,
                prefix,
                threads,
            } => {
                let mut args = vec!["-s".to_string(), path_arg(alignment)];
                if let Some(partition) = partition {
                    args.push("-spp".to_string());
                    args.push(path_arg(partition));
                }
                args.extend([
                    "-m".to_string(),
                    "MFP".to_string(),
                    "-bb".to_string(),
                    "1000".to_string(),
                    "-pre".to_string(),
                    path_arg(prefix),
                    "-T".to_string(),
                    (*threads).max(1).to_string(),
                ]);
                args
            }
        }
    }

    /// The file this invocation is expected to leave behind
    pub fn expected_output(&self) -> PathBuf {
        match self {
            ToolInvocation::MakeDatabase { database, .. } => database.clone(),
            ToolInvocation::Search { output, .. } => output.clone(),
            ToolInvocation::Align { output, .. } => output.clone(),
            ToolInvocation::FastTree { output, .. } => output.clone(),
            ToolInvocation::IqTree { prefix, .. } => {
                let mut name = prefix.as_os_str().to_os_string();
                name.push(".treefile");
                PathBuf::from(name)
            }
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> Result<()>;
}

/// Configured locations of the external binaries; `None` means search `PATH`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub diamond: Option<PathBuf>,
    pub muscle: Option<PathBuf>,
    pub fasttree: Option<PathBuf>,
    pub iqtree: Option<PathBuf>,
}

impl ToolPaths {
    pub fn configured(&self, tool: Tool) -> Option<&PathBuf> {
        match tool {
            Tool::Diamond => self.diamond.as_ref(),
            Tool::Muscle => self.muscle.as_ref(),
            Tool::FastTree => self.fasttree.as_ref(),
            Tool::IqTree => self.iqtree.as_ref(),
        }
    }

    /// Configured path, else the first default executable found on `PATH`
    pub fn resolve(&self, tool: Tool) -> Result<PathBuf> {
        if let Some(path) = self.configured(tool) {
            return Ok(path.clone());
        }

        for candidate in tool.default_executables() {
            if let Ok(path) = which::which(candidate) {
                return Ok(path);
            }
        }

        Err(GetphyloError::tool_failure(
            tool.name(),
            format!(
                "executable not found on PATH (tried {}); set its path in the configuration",
                tool.default_executables().join(", ")
            ),
        ))
    }
}

/// Runs invocations as child processes of the real binaries
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    paths: ToolPaths,
}

impl ProcessRunner {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<()> {
        let tool = invocation.tool();
        let binary = self.paths.resolve(tool)?;
        let args = invocation.args();

        log::debug!("Running '{} {}'", binary.display(), args.join(" "));
        let start = Instant::now();

        let output = Command::new(&binary).args(&args).output().map_err(|e| {
            GetphyloError::tool_failure(
                tool.name(),
                format!("could not start {}: {}", binary.display(), e),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GetphyloError::tool_failure(
                tool.name(),
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        log::debug!(
            "{} finished in {:.2}s",
            tool.name(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
