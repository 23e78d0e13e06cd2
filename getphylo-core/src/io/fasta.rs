//! FASTA sequence collections
//!
//! Parsing goes through needletail; gzip input is decompressed with flate2
//! first. Output is always one unwrapped sequence line per record, which is
//! what the downstream search and alignment tools expect.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use needletail::parse_fastx_reader;

use crate::error::{GetphyloError, Result};
use crate::types::{NamedSequence, SequenceCollection};

/// Reads and writes named-sequence collections
pub struct SequenceStore;

impl SequenceStore {
    /// Read all records of a FASTA file, keeping duplicates and file order.
    /// An empty file yields an empty vector.
    pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<NamedSequence>> {
        let path = path.as_ref();
        let bytes = Self::read_bytes(path)?;
        Self::parse_bytes(bytes).map_err(|message| GetphyloError::bad_record(path, message))
    }

    /// Read a FASTA file into a collection with unique identifiers
    pub fn read<P: AsRef<Path>>(path: P) -> Result<SequenceCollection> {
        let path = path.as_ref();
        let records = Self::read_records(path)?;
        SequenceCollection::from_records(path.display().to_string(), records)
    }

    fn read_bytes(path: &Path) -> Result<Vec<u8>> {
        let file = File::open(path)?;
        let mut bytes = Vec::new();
        if path.to_string_lossy().ends_with(".gz") {
            GzDecoder::new(file).read_to_end(&mut bytes)?;
        } else {
            let mut file = file;
            file.read_to_end(&mut bytes)?;
        }
        Ok(bytes)
    }

    fn parse_bytes(bytes: Vec<u8>) -> std::result::Result<Vec<NamedSequence>, String> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }

        let mut reader = parse_fastx_reader(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
        let mut records = Vec::new();
        while let Some(record) = reader.next() {
            let record = record.map_err(|e| e.to_string())?;
            let header = String::from_utf8_lossy(record.id()).to_string();
            let id = extract_sequence_name(&header);
            if id.is_empty() {
                return Err("record with an empty header".to_string());
            }
            let residues = String::from_utf8_lossy(&record.seq()).to_string();
            records.push(NamedSequence::new(id, residues));
        }
        Ok(records)
    }

    /// Write records, replacing any existing file
    pub fn write<'a, P, I>(path: P, records: I) -> Result<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = &'a NamedSequence>,
    {
        let file = File::create(path.as_ref())?;
        Self::write_to(file, records)
    }

    /// Write records to a file that must not exist yet.
    /// Fails with `std::io::ErrorKind::AlreadyExists` and leaves the existing file untouched.
    pub fn create<'a, P, I>(path: P, records: I) -> Result<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = &'a NamedSequence>,
    {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        Self::write_to(file, records)
    }

    fn write_to<'a, I>(file: File, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a NamedSequence>,
    {
        let mut writer = BufWriter::new(file);
        for record in records {
            writeln!(writer, ">{}", record.id)?;
            writeln!(writer, "{}", record.residues)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn extract_sequence_name(header: &str) -> String {
    header.split_whitespace().next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_multiline_records() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ">prot_1 some description").unwrap();
        writeln!(file, "MKV").unwrap();
        writeln!(file, "LLA").unwrap();
        writeln!(file, ">prot_2").unwrap();
        writeln!(file, "MA-K").unwrap();

        let records = SequenceStore::read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], NamedSequence::new("prot_1", "MKVLLA"));
        assert_eq!(records[1], NamedSequence::new("prot_2", "MA-K"));
    }

    #[test]
    fn test_empty_file_is_empty_collection() {
        let file = NamedTempFile::new().unwrap();
        assert!(SequenceStore::read(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_bad_record() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not fasta").unwrap();
        let err = SequenceStore::read(file.path()).unwrap_err();
        assert_eq!(err.kind(), "BadRecord");
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.fasta");
        let records = vec![NamedSequence::new("a", "MK")];

        SequenceStore::create(&path, &records).unwrap();
        let err = SequenceStore::create(&path, &[NamedSequence::new("b", "QQ")]).unwrap_err();
        match err {
            GetphyloError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::AlreadyExists),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ">a\nMK\n");
    }

    #[test]
    fn test_gzip_input() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempdir().unwrap();
        let path = dir.path().join("genome.faa.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b">g1\nMKV\n").unwrap();
        encoder.finish().unwrap();

        let collection = SequenceStore::read(&path).unwrap();
        assert_eq!(collection.get("g1").unwrap().residues, "MKV");
    }
}
