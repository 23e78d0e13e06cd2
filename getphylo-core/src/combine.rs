//! Alignment reconciliation
//!
//! Per-marker alignments are produced independently and each covers only the
//! organisms that carry that marker. Reconciliation folds them into one
//! concatenated alignment:
//!
//! * markers are concatenated in lexicographic order of their identifiers,
//!   so repeated runs over the same inputs give byte-identical output;
//! * an organism missing from a marker gets a block of [`MISSING_DATA`] of
//!   exactly that marker's width;
//! * an organism absent from every marker is dropped and reported;
//! * the partition map records the 1-based column range of every marker in
//!   the same order.
//!
//! Alignment headers are mapped back to organisms through an
//! [`OrganismIndex`], never by splitting the header text.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checkpoint::{Checkpoint, Stage};
use crate::error::{GetphyloError, Result};
use crate::io::{file_stem_string, list_files_with_extension, SequenceStore};
use crate::layout::{OutputLayout, COMBINED_ALIGNMENT};
use crate::matrix::PresenceAbsenceMatrix;
use crate::organism::OrganismIndex;
use crate::types::{MarkerId, NamedSequence, Organism, MISSING_DATA};

/// Substitution model written to the partition file when none is configured
pub const DEFAULT_PARTITION_MODEL: &str = "LG";

/// Aligned sequences of one marker, keyed by organism
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerMarkerAlignment {
    marker: MarkerId,
    width: usize,
    rows: BTreeMap<String, String>,
}

impl PerMarkerAlignment {
    /// Re-key aligned records by organism.
    ///
    /// Fails with `BadAlignment` when the records are empty, a header is not
    /// in `index`, two records belong to the same organism, the rows differ
    /// in length, or a row already contains the reserved no-data symbol.
    pub fn from_records(
        marker: &str,
        records: Vec<NamedSequence>,
        index: &OrganismIndex,
    ) -> Result<Self> {
        let width = match records.first() {
            Some(first) => first.len(),
            None => return Err(GetphyloError::bad_alignment(marker, "alignment contains no sequences")),
        };
        if width == 0 {
            return Err(GetphyloError::bad_alignment(marker, "alignment has no columns"));
        }

        let mut rows = BTreeMap::new();
        for record in records {
            let organism = index.organism_for(&record.id).ok_or_else(|| {
                GetphyloError::bad_alignment(
                    marker,
                    format!("header {} does not match any extracted sequence", record.id),
                )
            })?;

            if record.len() != width {
                return Err(GetphyloError::bad_alignment(
                    marker,
                    format!(
                        "{} has {} columns, expected {}",
                        record.id,
                        record.len(),
                        width
                    ),
                ));
            }

            if record.residues.contains(MISSING_DATA) {
                return Err(GetphyloError::bad_alignment(
                    marker,
                    format!("{} contains the reserved symbol '{}'", record.id, MISSING_DATA),
                ));
            }

            if rows.insert(organism.to_string(), record.residues).is_some() {
                return Err(GetphyloError::bad_alignment(
                    marker,
                    format!("organism {} appears more than once", organism),
                ));
            }
        }

        Ok(Self {
            marker: marker.to_string(),
            width,
            rows,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P, marker: &str, index: &OrganismIndex) -> Result<Self> {
        let records = SequenceStore::read_records(path)?;
        Self::from_records(marker, records, index)
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Column count shared by every row
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, organism: &str) -> Option<&str> {
        self.rows.get(organism).map(String::as_str)
    }

    pub fn organisms(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Column range of one marker in the combined alignment, 1-based and inclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionEntry {
    pub marker: MarkerId,
    pub start: usize,
    pub end: usize,
    pub model: String,
}

impl fmt::Display for PartitionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {} = {}-{}", self.model, self.marker, self.start, self.end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionMap {
    entries: Vec<PartitionEntry>,
}

impl PartitionMap {
    pub fn entries(&self) -> &[PartitionEntry] {
        &self.entries
    }

    pub fn total_length(&self) -> usize {
        self.entries.last().map(|e| e.end).unwrap_or(0)
    }

    fn push(&mut self, marker: &str, width: usize, model: &str) {
        let start = self.total_length() + 1;
        self.entries.push(PartitionEntry {
            marker: marker.to_string(),
            start,
            end: start + width - 1,
            model: model.to_string(),
        });
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for entry in &self.entries {
            writeln!(writer, "{}", entry)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// One equal-length row per organism
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedAlignment {
    rows: Vec<NamedSequence>,
}

impl CombinedAlignment {
    pub fn rows(&self) -> &[NamedSequence] {
        &self.rows
    }

    pub fn get(&self, organism: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.id == organism)
            .map(|row| row.residues.as_str())
    }

    pub fn length(&self) -> usize {
        self.rows.first().map(NamedSequence::len).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write to a new file; an existing file is left untouched and reported
    /// as `AlreadyExists`
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        SequenceStore::create(path, &self.rows).map_err(|e| match e {
            GetphyloError::Io(io) if io.kind() == std::io::ErrorKind::AlreadyExists => {
                GetphyloError::already_exists(path, Stage::MarkersAligned)
            }
            other => other,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub alignment: CombinedAlignment,
    pub partitions: PartitionMap,
    /// Organism x marker, 1 where the organism has a row in that marker
    pub presence: PresenceAbsenceMatrix,
    /// Organisms of the universe with no data in any marker
    pub removed: Vec<String>,
}

/// Fold per-marker alignments into one combined alignment.
///
/// `universe` is the full list of input organisms and fixes the row order.
/// Every organism of an alignment must belong to it.
pub fn reconcile(
    universe: &[String],
    mut alignments: Vec<PerMarkerAlignment>,
    model: &str,
) -> Result<Reconciliation> {
    alignments.sort_by(|a, b| a.marker.cmp(&b.marker));

    let known: HashSet<&str> = universe.iter().map(String::as_str).collect();
    let mut covered: HashSet<&str> = HashSet::new();
    for alignment in &alignments {
        for organism in alignment.organisms() {
            if !known.contains(organism) {
                return Err(GetphyloError::bad_alignment(
                    &alignment.marker,
                    format!("organism {} is not one of the inputs", organism),
                ));
            }
            covered.insert(organism);
        }
    }

    let mut partitions = PartitionMap::default();
    for alignment in &alignments {
        partitions.push(&alignment.marker, alignment.width, model);
    }
    let total_length = partitions.total_length();

    let mut removed = Vec::new();
    let mut rows = Vec::new();
    let mut presence = PresenceAbsenceMatrix::new(universe.to_vec());

    for organism in universe {
        if !covered.contains(organism.as_str()) {
            log::warn!("{} has no sequence data in any marker and has been removed", organism);
            removed.push(organism.clone());
            continue;
        }

        let mut residues = String::with_capacity(total_length);
        for alignment in &alignments {
            match alignment.get(organism) {
                Some(block) => residues.push_str(block),
                None => residues.extend(std::iter::repeat(MISSING_DATA).take(alignment.width)),
            }
        }
        rows.push(NamedSequence::new(organism.clone(), residues));
    }

    for alignment in &alignments {
        let column = universe
            .iter()
            .map(|organism| usize::from(alignment.get(organism).is_some()))
            .collect();
        presence.push_marker(alignment.marker.clone(), column);
    }

    Ok(Reconciliation {
        alignment: CombinedAlignment { rows },
        partitions,
        presence,
        removed,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkerSummary {
    pub marker: MarkerId,
    pub width: usize,
    pub organisms: usize,
}

/// Machine-readable record of a reconciliation, written as JSON
#[derive(Debug, Clone, Serialize)]
pub struct CombineSummary {
    pub organisms: usize,
    pub total_length: usize,
    pub markers: Vec<MarkerSummary>,
    pub partitions: Vec<PartitionEntry>,
    pub removed: Vec<String>,
}

impl CombineSummary {
    pub fn new(reconciliation: &Reconciliation) -> Self {
        let markers = reconciliation
            .partitions
            .entries()
            .iter()
            .enumerate()
            .map(|(i, entry)| MarkerSummary {
                marker: entry.marker.clone(),
                width: entry.end + 1 - entry.start,
                organisms: reconciliation.presence.presence(i),
            })
            .collect();

        Self {
            organisms: reconciliation.alignment.len(),
            total_length: reconciliation.partitions.total_length(),
            markers,
            partitions: reconciliation.partitions.entries().to_vec(),
            removed: reconciliation.removed.clone(),
        }
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self).map_err(std::io::Error::from)?;
        Ok(())
    }
}

/// Per-marker alignments in `aligned_fasta/`, excluding the combined artifact
pub fn list_marker_alignments(layout: &OutputLayout) -> Result<Vec<(MarkerId, PathBuf)>> {
    let paths = list_files_with_extension(layout.aligned_dir(), "fasta")?;
    Ok(paths
        .into_iter()
        .filter(|path| path.file_name().map(|n| n != COMBINED_ALIGNMENT).unwrap_or(true))
        .map(|path| (file_stem_string(&path), path))
        .collect())
}

/// Build and write the combined alignment, partition file and diagnostics
pub fn combine_alignments(
    layout: &OutputLayout,
    universe: &[Organism],
    model: &str,
    checkpoint: &Checkpoint,
) -> Result<Reconciliation> {
    let combined_path = layout.combined_alignment();
    if combined_path.exists() {
        return Err(GetphyloError::already_exists(&combined_path, Stage::MarkersAligned));
    }
    checkpoint.require(layout.aligned_dir(), Stage::MarkersAligned)?;

    let marker_files = list_marker_alignments(layout)?;
    if marker_files.is_empty() {
        return Err(GetphyloError::missing_prerequisite(
            Stage::MarkersAligned,
            layout.aligned_dir(),
            "no per-marker alignments found",
        ));
    }

    let index = OrganismIndex::build(layout, universe)?;
    let alignments = marker_files
        .iter()
        .map(|(marker, path)| PerMarkerAlignment::load(path, marker, &index))
        .collect::<Result<Vec<_>>>()?;

    let names: Vec<String> = universe.iter().map(|o| o.name.clone()).collect();
    let reconciliation = reconcile(&names, alignments, model)?;

    // written last: its presence blocks a rerun of this step
    reconciliation.partitions.write(layout.partition())?;
    reconciliation.presence.write(layout.combined_presence_absence())?;
    CombineSummary::new(&reconciliation).write(layout.combine_summary())?;
    reconciliation.alignment.write(&combined_path)?;

    log::info!(
        "Combined {} markers into a {}-column alignment of {} organisms",
        reconciliation.partitions.entries().len(),
        reconciliation.alignment.length(),
        reconciliation.alignment.len()
    );
    if !reconciliation.removed.is_empty() {
        log::warn!(
            "{} organisms removed for lack of data: {}",
            reconciliation.removed.len(),
            reconciliation.removed.join(", ")
        );
    }
    Ok(reconciliation)
}
