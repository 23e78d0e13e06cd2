//! Per-organism sequence extraction and search database building

use std::collections::HashSet;

use crate::checkpoint::Stage;
use crate::error::{GetphyloError, Result};
use crate::io::{create_list, SequenceStore};
use crate::layout::OutputLayout;
use crate::organism::ensure_enough_organisms;
use crate::pool::WorkerPool;
use crate::tools::{ToolInvocation, ToolRunner};
use crate::types::{NamedSequence, Organism};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Drop repeated sequence identifiers instead of failing
    pub ignore_bad_annotations: bool,
    /// Skip organisms whose input cannot be read instead of failing
    pub ignore_bad_records: bool,
}

/// Identifier as written to `fasta/`: first header token with `.` replaced by `_`
pub fn normalise_identifier(id: &str) -> String {
    id.split_whitespace().next().unwrap_or("").replace('.', "_")
}

/// Read one organism's CDS translations and normalise their identifiers
pub fn load_organism(organism: &Organism, options: ExtractOptions) -> Result<Vec<NamedSequence>> {
    let records = SequenceStore::read_records(&organism.source).map_err(|e| match e {
        GetphyloError::Io(io) => GetphyloError::bad_record(&organism.source, io.to_string()),
        other => other,
    })?;

    if records.is_empty() {
        return Err(GetphyloError::bad_record(&organism.source, "no sequences found"));
    }

    let mut seen = HashSet::new();
    let mut normalised = Vec::with_capacity(records.len());
    for record in records {
        let id = normalise_identifier(&record.id);
        if !seen.insert(id.clone()) {
            if options.ignore_bad_annotations {
                log::warn!("{}: dropping duplicate identifier {}", organism.name, id);
                continue;
            }
            return Err(GetphyloError::bad_annotation(
                organism.source.display().to_string(),
                format!("duplicate identifier {}", id),
            ));
        }
        normalised.push(NamedSequence::new(id, record.residues));
    }

    Ok(normalised)
}

/// Write `fasta/<organism>.fasta` for every readable organism and return those written
pub fn extract_sequences(
    layout: &OutputLayout,
    organisms: &[Organism],
    options: ExtractOptions,
) -> Result<Vec<Organism>> {
    let fasta_dir = layout.fasta_dir();
    if fasta_dir.exists() {
        return Err(GetphyloError::already_exists(&fasta_dir, Stage::Start));
    }
    layout.ensure_dir(&fasta_dir)?;

    let mut extracted = Vec::with_capacity(organisms.len());
    let mut skipped = Vec::new();
    for organism in organisms {
        log::info!("Extracting CDS translations from {}", organism.source.display());
        let records = match load_organism(organism, options) {
            Ok(records) => records,
            Err(e @ GetphyloError::BadRecord { .. }) if options.ignore_bad_records => {
                log::warn!("Skipping {}: {}", organism.name, e);
                skipped.push(organism.name.clone());
                continue;
            }
            Err(e) => return Err(e),
        };

        SequenceStore::create(layout.organism_fasta(&organism.name), &records)?;
        log::debug!("{}: {} sequences", organism.name, records.len());
        extracted.push(organism.clone());
    }

    create_list(layout.skipped_organisms(), &skipped)?;
    ensure_enough_organisms(extracted.len(), &fasta_dir.display().to_string())?;
    Ok(extracted)
}

/// One `diamond makedb` per organism
pub fn build_databases(
    layout: &OutputLayout,
    organisms: &[Organism],
    pool: &WorkerPool,
    runner: &dyn ToolRunner,
) -> Result<()> {
    log::info!("Building search databases for {} organisms", organisms.len());
    layout.ensure_dir(&layout.dmnd_dir())?;

    let jobs = organisms
        .iter()
        .map(|organism| ToolInvocation::MakeDatabase {
            input: layout.organism_fasta(&organism.name),
            database: layout.organism_database(&organism.name),
        })
        .collect();

    pool.run_tools(runner, jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn input(dir: &Path, name: &str, content: &str) -> Organism {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        Organism::from_path(path).unwrap()
    }

    #[test]
    fn test_identifiers_are_normalised() {
        assert_eq!(normalise_identifier("NC_003888.3_SCO0001 gene=x"), "NC_003888_3_SCO0001");
    }

    #[test]
    fn test_duplicate_identifiers() {
        let dir = tempdir().unwrap();
        let organism = input(dir.path(), "s1.fasta", ">a.1\nMK\n>a_1\nMQ\n>b\nMA\n");

        let err = load_organism(&organism, ExtractOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "BadAnnotation");

        let options = ExtractOptions {
            ignore_bad_annotations: true,
            ..ExtractOptions::default()
        };
        let records = load_organism(&organism, options).unwrap();
        assert_eq!(records, vec![NamedSequence::new("a_1", "MK"), NamedSequence::new("b", "MA")]);
    }

    #[test]
    fn test_bad_records_skipped_only_when_ignored() {
        let dir = tempdir().unwrap();
        let inputs = dir.path().join("inputs");
        fs::create_dir(&inputs).unwrap();
        let organisms = vec![
            input(&inputs, "s1.fasta", ">a\nMK\n"),
            input(&inputs, "s2.fasta", ""),
            input(&inputs, "s3.fasta", ">a\nMK\n"),
            input(&inputs, "s4.fasta", ">a\nMK\n"),
        ];

        let strict = OutputLayout::new(dir.path().join("strict"));
        let err = extract_sequences(&strict, &organisms, ExtractOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "BadRecord");

        let lenient = OutputLayout::new(dir.path().join("lenient"));
        let options = ExtractOptions {
            ignore_bad_records: true,
            ..ExtractOptions::default()
        };
        let extracted = extract_sequences(&lenient, &organisms, options).unwrap();
        let names: Vec<&str> = extracted.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["s1", "s3", "s4"]);
        assert!(!lenient.organism_fasta("s2").exists());
        assert_eq!(fs::read_to_string(lenient.skipped_organisms()).unwrap(), "s2\n");
    }

    #[test]
    fn test_existing_fasta_dir_is_refused() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        fs::create_dir_all(layout.fasta_dir()).unwrap();
        let err = extract_sequences(&layout, &[], ExtractOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "AlreadyExists");
    }
}
