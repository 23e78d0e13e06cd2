//! Input organisms and the header -> organism lookup
//!
//! Per-marker alignments carry headers of the form `<organism>_<sequence-id>`.
//! [`OrganismIndex`] maps such headers back to their organism using the
//! per-organism sequence sets written by extraction, so nothing downstream
//! has to split headers apart.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::checkpoint::{Checkpoint, Stage};
use crate::error::{GetphyloError, Result};
use crate::io::{read_list, SequenceStore};
use crate::layout::OutputLayout;
use crate::types::Organism;

pub const MIN_ORGANISMS: usize = 3;

/// Expand `pattern` into the sorted list of input organisms
pub fn discover_organisms(pattern: &str) -> Result<Vec<Organism>> {
    let entries = glob::glob(pattern)
        .map_err(|e| GetphyloError::bad_input(format!("invalid input pattern '{}': {}", pattern, e)))?;

    let mut organisms = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| GetphyloError::Io(e.into_error()))?;
        if path.is_dir() {
            return Err(GetphyloError::bad_input(format!(
                "{} is a directory; the input pattern must match sequence files (e.g. 'genomes/*.fasta')",
                path.display()
            )));
        }
        organisms.push(Organism::from_path(&path)?);
    }
    organisms.sort_by(|a, b| a.source.cmp(&b.source));

    let mut seen = HashSet::new();
    for organism in &organisms {
        if !seen.insert(organism.name.as_str()) {
            return Err(GetphyloError::bad_input(format!(
                "two inputs share the organism name '{}'",
                organism.name
            )));
        }
    }

    ensure_enough_organisms(organisms.len(), pattern)?;
    log::info!("Found {} input organisms matching '{}'", organisms.len(), pattern);
    Ok(organisms)
}

pub fn ensure_enough_organisms(count: usize, context: &str) -> Result<()> {
    if count < MIN_ORGANISMS {
        return Err(GetphyloError::bad_input(format!(
            "{} organisms available from '{}', at least {} are required",
            count, context, MIN_ORGANISMS
        )));
    }
    Ok(())
}

/// Pick the reference organism used for marker discovery.
///
/// `requested` may be an organism name or the path of an input file. Without
/// one, a fresh run falls back to the first input; a resumed run cannot,
/// because the earlier run may have used a different seed.
pub fn resolve_seed<'a>(
    organisms: &'a [Organism],
    requested: Option<&str>,
    checkpoint: &Checkpoint,
) -> Result<&'a Organism> {
    match requested {
        Some(requested) => {
            let wanted = Organism::from_path(requested)
                .map(|o| o.name)
                .unwrap_or_else(|_| requested.to_string());
            organisms
                .iter()
                .find(|o| o.name == requested || o.name == wanted || o.source == Path::new(requested))
                .ok_or_else(|| {
                    GetphyloError::bad_seed(format!("'{}' is not one of the input organisms", requested))
                })
        }
        None if checkpoint.is_resuming() => Err(GetphyloError::bad_seed(format!(
            "a seed organism must be given when resuming from {}",
            checkpoint.resume()
        ))),
        None => {
            let first = organisms
                .first()
                .ok_or_else(|| GetphyloError::bad_input("no input organisms"))?;
            log::warn!("No seed organism given; using {}", first.name);
            Ok(first)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrganismIndex {
    owners: HashMap<String, String>,
}

impl OrganismIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header_key(organism: &str, sequence_id: &str) -> String {
        format!("{}_{}", organism, sequence_id)
    }

    /// Register one extracted sequence; a key claimed by another organism is ambiguous
    pub fn insert(&mut self, organism: &str, sequence_id: &str) -> Result<()> {
        let key = Self::header_key(organism, sequence_id);
        match self.owners.get(&key) {
            Some(owner) if owner != organism => Err(GetphyloError::bad_annotation(
                organism,
                format!("header '{}' also belongs to organism '{}'", key, owner),
            )),
            _ => {
                self.owners.insert(key, organism.to_string());
                Ok(())
            }
        }
    }

    /// Index every `fasta/<organism>.fasta` present for the given organisms.
    /// Organisms without an extracted file contribute nothing.
    pub fn build(layout: &OutputLayout, organisms: &[Organism]) -> Result<Self> {
        let mut index = Self::new();
        for organism in organisms {
            let path = layout.organism_fasta(&organism.name);
            if !path.exists() {
                log::debug!("No extracted sequences for {}", organism.name);
                continue;
            }
            for record in SequenceStore::read_records(&path)? {
                index.insert(&organism.name, &record.id)?;
            }
        }
        Ok(index)
    }

    pub fn organism_for(&self, header: &str) -> Option<&str> {
        self.owners.get(header).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Organisms an earlier extraction wrote to `fasta/`.
///
/// Every input needs its own `fasta/<organism>.fasta` unless the earlier run
/// listed it in `skipped_organisms.txt`.
pub fn load_extracted(
    layout: &OutputLayout,
    organisms: &[Organism],
    checkpoint: &Checkpoint,
) -> Result<Vec<Organism>> {
    checkpoint.require(layout.fasta_dir(), Stage::SequencesExtracted)?;
    let skipped_path = layout.skipped_organisms();
    let skipped: HashSet<String> = if skipped_path.exists() {
        read_list(&skipped_path)?.into_iter().collect()
    } else {
        HashSet::new()
    };

    let mut extracted = Vec::with_capacity(organisms.len());
    for organism in organisms {
        if skipped.contains(&organism.name) {
            log::warn!("{} was skipped when sequences were extracted", organism.name);
            continue;
        }
        checkpoint.require(layout.organism_fasta(&organism.name), Stage::SequencesExtracted)?;
        extracted.push(organism.clone());
    }

    ensure_enough_organisms(extracted.len(), &layout.fasta_dir().display().to_string())?;
    Ok(extracted)
}
