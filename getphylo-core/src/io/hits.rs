//! Tab-delimited homology search tables
//!
//! Search results carry no header line; columns are `qseqid sseqid pident`.

use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{GetphyloError, Result};
use crate::types::HitRecord;

pub fn read_hits<P: AsRef<Path>>(path: P) -> Result<Vec<HitRecord>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;

    let mut records = Vec::new();
    for res in reader.records() {
        let rec = res?;
        let hit: HitRecord = rec
            .deserialize(None)
            .map_err(|e| GetphyloError::bad_record(path, e.to_string()))?;
        records.push(hit);
    }

    Ok(records)
}

/// Number of rows per query identifier
pub fn count_queries(hits: &[HitRecord]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for hit in hits {
        *counts.entry(hit.query_id.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Query identifiers with exactly one row, in order of first appearance
pub fn unique_queries(hits: &[HitRecord]) -> Vec<String> {
    let counts = count_queries(hits);
    hits.iter()
        .filter(|hit| counts.get(hit.query_id.as_str()) == Some(&1))
        .map(|hit| hit.query_id.clone())
        .collect()
}

/// Subject of the first row whose query is `query_id`
pub fn first_subject_for<'a>(hits: &'a [HitRecord], query_id: &str) -> Option<&'a str> {
    hits.iter()
        .find(|hit| hit.query_id == query_id)
        .map(|hit| hit.subject_id.as_str())
}
