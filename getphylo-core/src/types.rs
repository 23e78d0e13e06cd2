use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{GetphyloError, Result};

/// Marker (locus) identifier as written in the seed organism's proteome
pub type MarkerId = String;

/// Symbol reserved for "no data" blocks in the combined alignment
pub const MISSING_DATA: char = '?';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSequence {
    pub id: String,
    pub residues: String,
}

impl NamedSequence {
    pub fn new<I: Into<String>, R: Into<String>>(id: I, residues: R) -> Self {
        Self {
            id: id.into(),
            residues: residues.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// Named sequences with identifiers unique inside the collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceCollection {
    records: Vec<NamedSequence>,
    record_map: HashMap<String, usize>,
}

impl SequenceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; a repeated identifier is rejected and the record is not stored
    pub fn push(&mut self, record: NamedSequence) -> std::result::Result<(), NamedSequence> {
        if self.record_map.contains_key(&record.id) {
            return Err(record);
        }
        self.record_map.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Build from records, failing on the first duplicate identifier
    pub fn from_records<S: Into<String>>(source: S, records: Vec<NamedSequence>) -> Result<Self> {
        let source = source.into();
        let mut collection = Self::new();
        for record in records {
            if let Err(dup) = collection.push(record) {
                return Err(GetphyloError::bad_annotation(
                    source,
                    format!("duplicate identifier {}", dup.id),
                ));
            }
        }
        Ok(collection)
    }

    pub fn get(&self, id: &str) -> Option<&NamedSequence> {
        self.record_map.get(id).and_then(|&idx| self.records.get(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.record_map.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedSequence> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One row of a tabular homology search result (`qseqid sseqid pident`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    pub query_id: String,
    pub subject_id: String,
    pub identity: f64,
}

/// An input genome, named after the stem of its source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Organism {
    pub name: String,
    pub source: PathBuf,
}

impl Organism {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .and_then(|n| organism_name_from_file_name(&n))
            .ok_or_else(|| {
                GetphyloError::bad_input(format!(
                    "Cannot derive an organism name from {}",
                    path.display()
                ))
            })?;

        Ok(Self {
            name,
            source: path.to_path_buf(),
        })
    }
}

/// `genome.faa` -> `genome`, `genome.faa.gz` -> `genome`
fn organism_name_from_file_name(file_name: &str) -> Option<String> {
    let trimmed = file_name.strip_suffix(".gz").unwrap_or(file_name);
    let stem = match trimmed.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => trimmed,
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
