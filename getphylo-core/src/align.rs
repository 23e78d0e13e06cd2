//! Per-marker sequence sets and their alignment

use std::collections::HashMap;

use crate::checkpoint::{Checkpoint, Stage};
use crate::error::{GetphyloError, Result};
use crate::io::hits::first_subject_for;
use crate::io::{read_hits, SequenceStore};
use crate::layout::OutputLayout;
use crate::organism::OrganismIndex;
use crate::pool::WorkerPool;
use crate::tools::{ToolInvocation, ToolRunner};
use crate::types::{HitRecord, MarkerId, NamedSequence, Organism, SequenceCollection};

/// Search hits and extracted sequences of one organism
pub struct OrganismHits {
    pub name: String,
    pub hits: Vec<HitRecord>,
    pub sequences: SequenceCollection,
}

impl OrganismHits {
    pub fn load(layout: &OutputLayout, organism: &Organism, checkpoint: &Checkpoint) -> Result<Self> {
        let hits_path = layout.organism_hits(&organism.name);
        let fasta_path = layout.organism_fasta(&organism.name);
        checkpoint.require(&hits_path, Stage::MarkersSearched)?;
        checkpoint.require(&fasta_path, Stage::SequencesExtracted)?;

        Ok(Self {
            name: organism.name.clone(),
            hits: read_hits(&hits_path)?,
            sequences: SequenceStore::read(&fasta_path)?,
        })
    }

    /// This organism's copy of `marker`, named `<organism>_<sequence-id>`
    pub fn marker_copy(&self, marker: &str) -> Result<Option<NamedSequence>> {
        let subject = match first_subject_for(&self.hits, marker) {
            Some(subject) => subject,
            None => return Ok(None),
        };

        let sequence = self.sequences.get(subject).ok_or_else(|| {
            GetphyloError::bad_locus(
                marker,
                format!("hit {} is not among the sequences of {}", subject, self.name),
            )
        })?;

        Ok(Some(NamedSequence::new(
            OrganismIndex::header_key(&self.name, subject),
            sequence.residues.clone(),
        )))
    }
}

/// Collect every organism's copy of `marker`; organisms without a hit are left out
pub fn collect_marker(marker: &str, organisms: &[OrganismHits]) -> Result<Vec<NamedSequence>> {
    let mut records = Vec::new();
    for organism in organisms {
        if let Some(copy) = organism.marker_copy(marker)? {
            records.push(copy);
        }
    }

    if records.is_empty() {
        return Err(GetphyloError::bad_locus(marker, "no organism has a hit for this marker"));
    }
    Ok(records)
}

/// Write `unaligned_fasta/<marker>.fasta` for every marker
pub fn extract_markers(
    layout: &OutputLayout,
    organisms: &[Organism],
    markers: &[MarkerId],
    checkpoint: &Checkpoint,
) -> Result<()> {
    log::info!("Extracting {} markers from {} organisms", markers.len(), organisms.len());
    let loaded = organisms
        .iter()
        .map(|organism| OrganismHits::load(layout, organism, checkpoint))
        .collect::<Result<Vec<_>>>()?;

    layout.ensure_dir(&layout.unaligned_dir())?;
    let mut coverage: HashMap<usize, usize> = HashMap::new();
    for marker in markers {
        let records = collect_marker(marker, &loaded)?;
        *coverage.entry(records.len()).or_insert(0) += 1;
        SequenceStore::write(layout.unaligned_marker(marker), &records)?;
    }

    for (organisms_with_copy, count) in coverage {
        log::debug!("{} markers found in {} organisms", count, organisms_with_copy);
    }
    Ok(())
}

/// One aligner run per marker
pub fn align_markers(
    layout: &OutputLayout,
    markers: &[MarkerId],
    checkpoint: &Checkpoint,
    pool: &WorkerPool,
    runner: &dyn ToolRunner,
) -> Result<()> {
    for marker in markers {
        checkpoint.require(layout.unaligned_marker(marker), Stage::MarkersExtracted)?;
    }
    layout.ensure_dir(&layout.aligned_dir())?;

    log::info!("Aligning {} markers", markers.len());
    let jobs = markers
        .iter()
        .map(|marker| ToolInvocation::Align {
            input: layout.unaligned_marker(marker),
            output: layout.aligned_marker(marker),
        })
        .collect();

    pool.run_tools(runner, jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn organism(name: &str, hits: &[(&str, &str)], sequences: &[(&str, &str)]) -> OrganismHits {
        OrganismHits {
            name: name.to_string(),
            hits: hits
                .iter()
                .map(|(q, s)| HitRecord {
                    query_id: q.to_string(),
                    subject_id: s.to_string(),
                    identity: 90.0,
                })
                .collect(),
            sequences: SequenceCollection::from_records(
                name,
                sequences.iter().map(|(id, r)| NamedSequence::new(*id, *r)).collect(),
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_first_hit_names_the_copy() {
        let organisms = vec![
            organism("s1", &[("m1", "p1"), ("m1", "p2")], &[("p1", "MKV"), ("p2", "MQQ")]),
            organism("s2", &[("m2", "p1")], &[("p1", "MAA")]),
            organism("s3", &[("m1", "x9")], &[("x9", "MKI")]),
        ];

        let records = collect_marker("m1", &organisms).unwrap();
        assert_eq!(
            records,
            vec![NamedSequence::new("s1_p1", "MKV"), NamedSequence::new("s3_x9", "MKI")]
        );
    }

    #[test]
    fn test_missing_subject_is_bad_locus() {
        let organisms = vec![organism("s1", &[("m1", "ghost")], &[("p1", "MKV")])];
        assert_eq!(collect_marker("m1", &organisms).unwrap_err().kind(), "BadLocus");
        assert_eq!(collect_marker("m7", &organisms).unwrap_err().kind(), "BadLocus");
    }
}
