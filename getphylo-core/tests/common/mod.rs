#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use getphylo_core::io::SequenceStore;
use getphylo_core::tools::Tool;
use getphylo_core::{
    GetphyloError, NamedSequence, PipelineConfig, Result, Stage, Thresholds, ToolInvocation,
    ToolRunner,
};

/// In-process stand-in for DIAMOND, MUSCLE, FastTree and IQ-TREE.
///
/// A "database" is a copy of the FASTA input, a search reports every pair of
/// identical sequences, alignment pads rows with gaps to the longest one.
#[derive(Default)]
pub struct FakeRunner {
    pub calls: Mutex<Vec<ToolInvocation>>,
    pub fail_on: Option<Tool>,
}

impl FakeRunner {
    pub fn failing(tool: Tool) -> Self {
        Self {
            fail_on: Some(tool),
            ..Self::default()
        }
    }

    pub fn count(&self, tool: Tool) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.tool() == tool)
            .count()
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<()> {
        self.calls.lock().unwrap().push(invocation.clone());
        if self.fail_on == Some(invocation.tool()) {
            return Err(GetphyloError::tool_failure(invocation.tool().name(), "exit status: 1"));
        }

        match invocation {
            ToolInvocation::MakeDatabase { input, database } => {
                fs::copy(input, database)?;
            }
            ToolInvocation::Search {
                query,
                database,
                output,
                ..
            } => {
                let queries = SequenceStore::read_records(query)?;
                let subjects = SequenceStore::read_records(database)?;
                let mut out = fs::File::create(output)?;
                for q in &queries {
                    for s in subjects.iter().filter(|s| s.residues == q.residues) {
                        writeln!(out, "{}\t{}\t100.0", q.id, s.id)?;
                    }
                }
            }
            ToolInvocation::Align { input, output } => {
                let records = SequenceStore::read_records(input)?;
                let width = records.iter().map(NamedSequence::len).max().unwrap_or(0);
                let aligned: Vec<NamedSequence> = records
                    .into_iter()
                    .map(|r| {
                        let pad = "-".repeat(width - r.len());
                        NamedSequence::new(r.id, format!("{}{}", r.residues, pad))
                    })
                    .collect();
                SequenceStore::write(output, &aligned)?;
            }
            ToolInvocation::FastTree { .. } | ToolInvocation::IqTree { .. } => {
                fs::write(invocation.expected_output(), "(a,b,c);\n")?;
            }
        }
        Ok(())
    }
}

pub const MARKER_A: &str = "MKVLAGHIKR";
pub const MARKER_B: &str = "QWERT";

/// Three organisms: marker `a1` (10 residues) in s1 and s2, marker `b1`
/// (5 residues) in all three, plus a seed paralog pair that is never a
/// candidate.
pub fn write_three_organisms(dir: &Path) -> PathBuf {
    let inputs = dir.join("inputs");
    fs::create_dir_all(&inputs).unwrap();
    fs::write(
        inputs.join("s1.fasta"),
        format!(
            ">a1 marker A\n{}\n>b1\n{}\n>p1\nMPPPPPPPP\n>p2\nMPPPPPPPP\n",
            MARKER_A, MARKER_B
        ),
    )
    .unwrap();
    fs::write(
        inputs.join("s2.fasta"),
        format!(">x.a\n{}\n>x.b\n{}\n", MARKER_A, MARKER_B),
    )
    .unwrap();
    fs::write(
        inputs.join("s3.fasta"),
        format!(">y_b\n{}\n>y_other\nMLLLLLLLLL\n", MARKER_B),
    )
    .unwrap();
    inputs
}

pub fn config(inputs: &Path, output: &Path) -> PipelineConfig {
    PipelineConfig {
        inputs: format!("{}/*.fasta", inputs.display()),
        output: output.to_path_buf(),
        seed: Some("s1".to_string()),
        resume: Stage::Start,
        random_seed: Some(7),
        thresholds: Thresholds {
            min_length: 3,
            max_length: 100,
            presence: 60.0,
            ..Thresholds::default()
        },
        ..PipelineConfig::default()
    }
}
