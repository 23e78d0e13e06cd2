//! Organism x marker count tables
//!
//! Written as `;`-delimited CSV with a `strain` header column, one row per
//! organism and one column per marker.

use csv::WriterBuilder;
use std::path::Path;

use crate::error::Result;
use crate::types::MarkerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceAbsenceMatrix {
    organisms: Vec<String>,
    markers: Vec<MarkerId>,
    /// `columns[m][o]` = count of marker `m` in organism `o`
    columns: Vec<Vec<usize>>,
}

impl PresenceAbsenceMatrix {
    pub fn new(organisms: Vec<String>) -> Self {
        Self {
            organisms,
            markers: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Append one marker column; `counts` follows the organism order
    pub fn push_marker(&mut self, marker: MarkerId, counts: Vec<usize>) {
        debug_assert_eq!(counts.len(), self.organisms.len());
        self.markers.push(marker);
        self.columns.push(counts);
    }

    pub fn organisms(&self) -> &[String] {
        &self.organisms
    }

    pub fn markers(&self) -> &[MarkerId] {
        &self.markers
    }

    pub fn count(&self, organism: usize, marker: usize) -> usize {
        self.columns
            .get(marker)
            .and_then(|column| column.get(organism))
            .copied()
            .unwrap_or(0)
    }

    /// Number of organisms with at least one hit for `marker`
    pub fn presence(&self, marker: usize) -> usize {
        self.columns
            .get(marker)
            .map(|column| column.iter().filter(|&&c| c > 0).count())
            .unwrap_or(0)
    }

    /// Number of markers present in `organism`
    pub fn coverage(&self, organism: usize) -> usize {
        self.columns
            .iter()
            .filter(|column| column.get(organism).copied().unwrap_or(0) > 0)
            .count()
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = WriterBuilder::new().delimiter(b';').from_path(path)?;

        let mut header = Vec::with_capacity(self.markers.len() + 1);
        header.push("strain".to_string());
        header.extend(self.markers.iter().cloned());
        writer.write_record(&header)?;

        for (row, organism) in self.organisms.iter().enumerate() {
            let mut record = Vec::with_capacity(self.markers.len() + 1);
            record.push(organism.clone());
            record.extend((0..self.markers.len()).map(|m| self.count(row, m).to_string()));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}
