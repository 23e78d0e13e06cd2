//! Newline-delimited marker lists (`candidate_loci.txt`, `final_loci.txt`)

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

pub fn read_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn write_list<P: AsRef<Path>, S: AsRef<str>>(path: P, items: &[S]) -> Result<()> {
    write_items(File::create(path)?, items)
}

/// Like [`write_list`] but fails with `ErrorKind::AlreadyExists` instead of replacing a file
pub fn create_list<P: AsRef<Path>, S: AsRef<str>>(path: P, items: &[S]) -> Result<()> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    write_items(file, items)
}

fn write_items<S: AsRef<str>>(file: File, items: &[S]) -> Result<()> {
    let mut writer = BufWriter::new(file);
    for item in items {
        writeln!(writer, "{}", item.as_ref())?;
    }
    writer.flush()?;
    Ok(())
}
