//! Marker discovery, cross-organism search and thresholding
//!
//! Candidates are seed proteins whose only self-search hit is themselves.
//! They are shuffled before length filtering so that the genome position of
//! a gene does not bias which markers get picked. Each candidate is then
//! scored against every organism's search table: a marker passes when it is
//! present in enough organisms and never hits more than once in any of them.

use csv::WriterBuilder;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::checkpoint::{Checkpoint, Stage};
use crate::error::{GetphyloError, Result};
use crate::io::hits::unique_queries;
use crate::io::{create_list, read_hits, read_list, write_list, SequenceStore};
use crate::layout::OutputLayout;
use crate::matrix::PresenceAbsenceMatrix;
use crate::pool::WorkerPool;
use crate::tools::{SearchParams, ToolInvocation, ToolRunner};
use crate::types::{HitRecord, MarkerId, NamedSequence, Organism, SequenceCollection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Stop discovery after this many candidates; `None` keeps all
    pub find: Option<usize>,
    pub min_length: usize,
    pub max_length: usize,
    /// Percentage of organisms a marker must be found in
    pub presence: f64,
    pub min_loci: usize,
    pub max_loci: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            find: None,
            min_length: 100,
            max_length: 1000,
            presence: 100.0,
            min_loci: 1,
            max_loci: 1000,
        }
    }
}

/// Shuffle singleton loci, seeded when `random_seed` is given
pub fn shuffle_loci(loci: &mut [MarkerId], random_seed: Option<u64>) {
    let mut rng = match random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    loci.shuffle(&mut rng);
}

/// Keep loci with `min_length < length < max_length`, in order, up to `find`
pub fn select_candidates(
    loci: &[MarkerId],
    seed_sequences: &SequenceCollection,
    thresholds: &Thresholds,
) -> Result<Vec<NamedSequence>> {
    let mut selected = Vec::new();
    for locus in loci {
        if thresholds.find.map(|find| selected.len() >= find).unwrap_or(false) {
            break;
        }
        let sequence = seed_sequences
            .get(locus)
            .ok_or_else(|| GetphyloError::bad_locus(locus, "not found in the seed organism's sequences"))?;
        if thresholds.max_length > sequence.len() && sequence.len() > thresholds.min_length {
            selected.push(sequence.clone());
        }
    }
    Ok(selected)
}

/// Self-search the seed and write `tsv/candidate_loci.{txt,fasta}`
pub fn find_candidates(
    layout: &OutputLayout,
    seed: &Organism,
    thresholds: &Thresholds,
    random_seed: Option<u64>,
    checkpoint: &Checkpoint,
    runner: &dyn ToolRunner,
) -> Result<Vec<MarkerId>> {
    log::info!("Identifying singletons in seed organism {}", seed.name);
    let seed_fasta = layout.organism_fasta(&seed.name);
    let seed_database = layout.organism_database(&seed.name);
    checkpoint.require(&seed_fasta, Stage::SequencesExtracted)?;
    checkpoint.require(&seed_database, Stage::DatabasesBuilt)?;
    layout.ensure_dir(&layout.tsv_dir())?;

    let seed_hits = layout.seed_hits(&seed.name);
    runner.run(&ToolInvocation::Search {
        query: seed_fasta.clone(),
        database: seed_database,
        output: seed_hits.clone(),
        params: SearchParams::default(),
    })?;

    let mut singletons = unique_queries(&read_hits(&seed_hits)?);
    log::info!("Found {} singleton loci in the seed organism", singletons.len());
    shuffle_loci(&mut singletons, random_seed);

    let seed_sequences = SequenceStore::read(&seed_fasta)?;
    let candidates = select_candidates(&singletons, &seed_sequences, thresholds)?;
    if candidates.is_empty() {
        log::warn!(
            "No singleton in {} is between {} and {} residues long",
            seed.name,
            thresholds.min_length,
            thresholds.max_length
        );
    }

    let ids: Vec<MarkerId> = candidates.iter().map(|c| c.id.clone()).collect();
    write_list(layout.candidate_loci(), &ids)?;
    SequenceStore::write(layout.candidate_fasta(), &candidates)?;
    log::info!("{} candidate loci selected", ids.len());
    Ok(ids)
}

pub fn load_candidates(layout: &OutputLayout, checkpoint: &Checkpoint) -> Result<Vec<MarkerId>> {
    let path = layout.candidate_loci();
    checkpoint.require(&path, Stage::MarkersIdentified)?;
    read_list(path)
}

/// Search the candidate set against every organism's database
pub fn search_candidates(
    layout: &OutputLayout,
    organisms: &[Organism],
    params: &SearchParams,
    checkpoint: &Checkpoint,
    pool: &WorkerPool,
    runner: &dyn ToolRunner,
) -> Result<()> {
    let query = layout.candidate_fasta();
    checkpoint.require(&query, Stage::MarkersIdentified)?;
    for organism in organisms {
        checkpoint.require(layout.organism_database(&organism.name), Stage::DatabasesBuilt)?;
    }
    layout.ensure_dir(&layout.tsvs_dir())?;

    log::info!("Searching candidate loci against {} organisms", organisms.len());
    let jobs = organisms
        .iter()
        .map(|organism| ToolInvocation::Search {
            query: query.clone(),
            database: layout.organism_database(&organism.name),
            output: layout.organism_hits(&organism.name),
            params: params.clone(),
        })
        .collect();

    pool.run_tools(runner, jobs)
}

/// Presence and uniqueness of one marker across the search tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerScore {
    pub marker: MarkerId,
    pub presence: usize,
    pub total: usize,
    pub unique: bool,
    pub counts: Vec<usize>,
}

impl MarkerScore {
    pub fn presence_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.presence as f64 * 100.0) / self.total as f64
    }

    /// Unique everywhere and found in at least `presence_threshold` percent of organisms.
    /// A marker found nowhere never passes, whatever the threshold.
    pub fn passes(&self, presence_threshold: f64) -> bool {
        self.unique && self.presence > 0 && self.presence_percent() >= presence_threshold
    }
}

/// Count rows whose query is exactly `marker` in each table
pub fn score_marker(marker: &str, tables: &[Vec<HitRecord>]) -> MarkerScore {
    let counts: Vec<usize> = tables
        .iter()
        .map(|hits| hits.iter().filter(|hit| hit.query_id == marker).count())
        .collect();

    MarkerScore {
        marker: marker.to_string(),
        presence: counts.iter().filter(|&&c| c > 0).count(),
        total: tables.len(),
        unique: counts.iter().all(|&c| c <= 1),
        counts,
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdOutcome {
    pub selected: Vec<MarkerId>,
    pub scores: Vec<MarkerScore>,
    pub matrix: PresenceAbsenceMatrix,
}

/// Score candidates in order until `max_loci` markers have passed
pub fn apply_thresholds(
    candidates: &[MarkerId],
    organisms: &[String],
    tables: &[Vec<HitRecord>],
    presence_threshold: f64,
    max_loci: usize,
) -> ThresholdOutcome {
    let mut selected = Vec::new();
    let mut scores = Vec::new();
    let mut matrix = PresenceAbsenceMatrix::new(organisms.to_vec());

    for candidate in candidates {
        if selected.len() >= max_loci {
            log::info!("The maximum number of loci ({}) was reached", max_loci);
            break;
        }

        let score = score_marker(candidate, tables);
        log::debug!(
            "{}: present in {:.1}% of organisms, unique = {}",
            candidate,
            score.presence_percent(),
            score.unique
        );
        if score.passes(presence_threshold) {
            selected.push(candidate.clone());
        }
        matrix.push_marker(candidate.clone(), score.counts.clone());
        scores.push(score);
    }

    ThresholdOutcome {
        selected,
        scores,
        matrix,
    }
}

fn write_thresholding_data(path: &Path, scores: &[MarkerScore]) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b';').from_path(path)?;
    writer.write_record(["locus", "presence", "unique"])?;
    for score in scores {
        writer.write_record([
            score.marker.clone(),
            score.presence_percent().to_string(),
            score.unique.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Score the candidates, write the diagnostic tables and `final_loci.txt`
pub fn threshold_markers(
    layout: &OutputLayout,
    organisms: &[Organism],
    candidates: &[MarkerId],
    thresholds: &Thresholds,
    checkpoint: &Checkpoint,
) -> Result<Vec<MarkerId>> {
    let final_loci = layout.final_loci();
    if final_loci.exists() {
        return Err(GetphyloError::already_exists(&final_loci, Stage::MarkersSearched));
    }

    let mut names = Vec::with_capacity(organisms.len());
    let mut tables = Vec::with_capacity(organisms.len());
    for organism in organisms {
        let path = layout.organism_hits(&organism.name);
        checkpoint.require(&path, Stage::MarkersSearched)?;
        tables.push(read_hits(&path)?);
        names.push(organism.name.clone());
    }

    let outcome = apply_thresholds(
        candidates,
        &names,
        &tables,
        thresholds.presence,
        thresholds.max_loci,
    );

    write_thresholding_data(&layout.thresholding_data(), &outcome.scores)?;
    outcome.matrix.write(layout.presence_absence_table())?;

    let found = outcome.selected.len();
    log::info!("{} loci selected", found);
    if found < thresholds.max_loci {
        log::warn!(
            "Number of loci selected ({}) is lower than the maximum ({})",
            found,
            thresholds.max_loci
        );
    }
    if found < thresholds.min_loci {
        return Err(GetphyloError::InsufficientMarkers {
            found,
            required: thresholds.min_loci,
        });
    }

    create_list(&final_loci, &outcome.selected)?;
    Ok(outcome.selected)
}

pub fn load_final_markers(layout: &OutputLayout, checkpoint: &Checkpoint) -> Result<Vec<MarkerId>> {
    let path = layout.final_loci();
    checkpoint.require(&path, Stage::MarkersThresholded)?;
    let markers = read_list(&path)?;
    if markers.is_empty() {
        return Err(GetphyloError::missing_prerequisite(
            Stage::MarkersThresholded,
            &path,
            "the marker list is empty",
        ));
    }
    Ok(markers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn hit(query: &str, subject: &str) -> HitRecord {
        HitRecord {
            query_id: query.to_string(),
            subject_id: subject.to_string(),
            identity: 100.0,
        }
    }

    fn ids(names: &[&str]) -> Vec<MarkerId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_presence_threshold_k_of_n() {
        // locus present in 3 of 4 tables, once each
        let tables = vec![
            vec![hit("locus", "a")],
            vec![hit("locus", "b")],
            vec![],
            vec![hit("locus", "d")],
        ];
        let score = score_marker("locus", &tables);
        assert_eq!(score.presence, 3);
        assert!(score.unique);
        assert!(score.passes(75.0));
        assert!(!score.passes(75.1));
    }

    #[test]
    fn test_presence_threshold_exact_boundaries() {
        // k/n pairs whose quotient is not exact in binary
        for (k, n) in [(29, 100), (57, 100), (1, 3), (2, 3)] {
            let tables: Vec<Vec<HitRecord>> = (0..n)
                .map(|i| if i < k { vec![hit("locus", "x")] } else { vec![] })
                .collect();
            let score = score_marker("locus", &tables);
            let threshold = (k * 100) as f64 / n as f64;
            assert!(score.passes(threshold), "{} of {} at {}", k, n, threshold);
        }

        let tables: Vec<Vec<HitRecord>> = (0..100)
            .map(|i| if i < 29 { vec![hit("locus", "x")] } else { vec![] })
            .collect();
        let score = score_marker("locus", &tables);
        assert!(score.passes(29.0));
        assert!(!score.passes(29.5));
    }

    #[test]
    fn test_absent_marker_never_passes() {
        let tables = vec![vec![hit("other", "a")], vec![], vec![]];
        let score = score_marker("locus", &tables);
        assert_eq!(score.presence, 0);
        assert!(score.unique);
        assert!(!score.passes(0.0));

        let outcome = apply_thresholds(&ids(&["locus"]), &ids(&["s1", "s2", "s3"]), &tables, 0.0, 10);
        assert!(outcome.selected.is_empty());
    }

    #[test]
    fn test_duplicate_hit_never_passes() {
        let tables = vec![
            vec![hit("locus", "a"), hit("locus", "a2")],
            vec![hit("locus", "b")],
            vec![hit("locus", "c")],
        ];
        let score = score_marker("locus", &tables);
        assert_eq!(score.counts, vec![2, 1, 1]);
        assert!(!score.unique);
        assert!(!score.passes(0.0));
    }

    #[test]
    fn test_query_matching_is_exact() {
        let tables = vec![vec![hit("locus_10", "a")], vec![hit("locus_1", "b")]];
        assert_eq!(score_marker("locus_1", &tables).counts, vec![0, 1]);
    }

    #[test]
    fn test_max_loci_stops_scoring() {
        let tables = vec![
            vec![hit("a", "x"), hit("b", "x"), hit("c", "x")],
            vec![hit("a", "y"), hit("b", "y"), hit("c", "y")],
        ];
        let organisms = ids(&["s1", "s2"]);
        let outcome = apply_thresholds(&ids(&["a", "b", "c"]), &organisms, &tables, 100.0, 2);
        assert_eq!(outcome.selected, ids(&["a", "b"]));
        assert_eq!(outcome.scores.len(), 2);
        assert_eq!(outcome.matrix.markers(), &ids(&["a", "b"])[..]);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let original: Vec<MarkerId> = (0..50).map(|i| format!("locus_{}", i)).collect();
        let mut first = original.clone();
        let mut second = original.clone();
        shuffle_loci(&mut first, Some(42));
        shuffle_loci(&mut second, Some(42));
        assert_eq!(first, second);
        assert_ne!(first, original);
    }

    #[test]
    fn test_candidate_length_window_and_find() {
        let seed = SequenceCollection::from_records(
            "seed",
            vec![
                NamedSequence::new("short", "M".repeat(5)),
                NamedSequence::new("edge", "M".repeat(10)),
                NamedSequence::new("ok_1", "M".repeat(11)),
                NamedSequence::new("ok_2", "M".repeat(19)),
                NamedSequence::new("long", "M".repeat(20)),
            ],
        )
        .unwrap();
        let thresholds = Thresholds {
            min_length: 10,
            max_length: 20,
            ..Thresholds::default()
        };
        let loci = ids(&["short", "edge", "ok_1", "long", "ok_2"]);
        let picked = select_candidates(&loci, &seed, &thresholds).unwrap();
        let picked: Vec<&str> = picked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(picked, vec!["ok_1", "ok_2"]);

        let one = Thresholds {
            find: Some(1),
            ..thresholds.clone()
        };
        assert_eq!(select_candidates(&loci, &seed, &one).unwrap().len(), 1);

        let err = select_candidates(&ids(&["ghost"]), &seed, &thresholds).unwrap_err();
        assert_eq!(err.kind(), "BadLocus");
    }

    #[test]
    fn test_insufficient_markers_still_writes_tables() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        std::fs::create_dir_all(layout.tsvs_dir()).unwrap();
        let organisms: Vec<Organism> = ["s1", "s2", "s3"]
            .iter()
            .map(|n| Organism::from_path(format!("{}.fasta", n)).unwrap())
            .collect();
        std::fs::write(layout.organism_hits("s1"), "m1\tp1\t100\n").unwrap();
        std::fs::write(layout.organism_hits("s2"), "").unwrap();
        std::fs::write(layout.organism_hits("s3"), "m1\tp9\t88.5\n").unwrap();

        let err = threshold_markers(
            &layout,
            &organisms,
            &ids(&["m1"]),
            &Thresholds::default(),
            &Checkpoint::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "InsufficientMarkers");
        assert!(!layout.final_loci().exists());
        assert_eq!(
            std::fs::read_to_string(layout.presence_absence_table()).unwrap(),
            "strain;m1\ns1;1\ns2;0\ns3;1\n"
        );
        let data = std::fs::read_to_string(layout.thresholding_data()).unwrap();
        assert!(data.starts_with("locus;presence;unique\nm1;66.66"));
    }

    #[test]
    fn test_existing_final_loci_is_refused() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        std::fs::write(layout.final_loci(), "m1\n").unwrap();
        let err = threshold_markers(&layout, &[], &[], &Thresholds::default(), &Checkpoint::default())
            .unwrap_err();
        assert_eq!(err.kind(), "AlreadyExists");
        assert_eq!(std::fs::read_to_string(layout.final_loci()).unwrap(), "m1\n");
    }
}
