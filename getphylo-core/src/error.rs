//! Error handling for getphylo
//!
//! Every fallible operation in the core returns [`GetphyloError`]. Nothing in
//! this crate terminates the process; the binary decides how to report.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::checkpoint::Stage;

/// Main error type for getphylo pipeline operations
#[derive(Error, Debug)]
pub enum GetphyloError {
    #[error("Bad input: {message}")]
    BadInput { message: String },

    #[error("Bad seed: {message}")]
    BadSeed { message: String },

    #[error("Bad annotation in {source_name}: {message}")]
    BadAnnotation { source_name: String, message: String },

    #[error("Bad record in {path}: {message}")]
    BadRecord { path: PathBuf, message: String },

    #[error("Missing prerequisite produced by {stage}: {path} ({message})")]
    MissingPrerequisite {
        stage: Stage,
        path: PathBuf,
        message: String,
    },

    #[error("{path} already exists; remove it and restart from {stage}")]
    AlreadyExists { path: PathBuf, stage: Stage },

    #[error("Insufficient markers: {found} selected, at least {required} required")]
    InsufficientMarkers { found: usize, required: usize },

    #[error("Bad locus {locus}: {message}")]
    BadLocus { locus: String, message: String },

    #[error("Bad alignment for marker {marker}: {message}")]
    BadAlignment { marker: String, message: String },

    #[error("External tool error: {tool} - {message}")]
    ToolFailure { tool: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table error: {0}")]
    Table(#[from] csv::Error),
}

impl GetphyloError {
    pub fn bad_input<S: Into<String>>(message: S) -> Self {
        Self::BadInput { message: message.into() }
    }

    pub fn bad_seed<S: Into<String>>(message: S) -> Self {
        Self::BadSeed { message: message.into() }
    }

    pub fn bad_annotation<S: Into<String>, M: Into<String>>(source_name: S, message: M) -> Self {
        Self::BadAnnotation {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn bad_record<P: AsRef<Path>, S: Into<String>>(path: P, message: S) -> Self {
        Self::BadRecord {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn missing_prerequisite<P: AsRef<Path>, S: Into<String>>(
        stage: Stage,
        path: P,
        message: S,
    ) -> Self {
        Self::MissingPrerequisite {
            stage,
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn already_exists<P: AsRef<Path>>(path: P, stage: Stage) -> Self {
        Self::AlreadyExists {
            path: path.as_ref().to_path_buf(),
            stage,
        }
    }

    pub fn bad_locus<S: Into<String>, M: Into<String>>(locus: S, message: M) -> Self {
        Self::BadLocus {
            locus: locus.into(),
            message: message.into(),
        }
    }

    pub fn bad_alignment<S: Into<String>, M: Into<String>>(marker: S, message: M) -> Self {
        Self::BadAlignment {
            marker: marker.into(),
            message: message.into(),
        }
    }

    pub fn tool_failure<S: Into<String>, M: Into<String>>(tool: S, message: M) -> Self {
        Self::ToolFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Short, stable name of the error kind, used in log lines and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadInput { .. } => "BadInput",
            Self::BadSeed { .. } => "BadSeed",
            Self::BadAnnotation { .. } => "BadAnnotation",
            Self::BadRecord { .. } => "BadRecord",
            Self::MissingPrerequisite { .. } => "MissingPrerequisite",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::InsufficientMarkers { .. } => "InsufficientMarkers",
            Self::BadLocus { .. } => "BadLocus",
            Self::BadAlignment { .. } => "BadAlignment",
            Self::ToolFailure { .. } => "ToolFailure",
            Self::Config { .. } => "Config",
            Self::Io(_) => "Io",
            Self::Table(_) => "Table",
        }
    }
}

/// Result type for getphylo operations
pub type Result<T> = std::result::Result<T, GetphyloError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = GetphyloError::bad_input("only 2 genomes");
        assert!(matches!(err, GetphyloError::BadInput { .. }));
        assert_eq!(err.to_string(), "Bad input: only 2 genomes");
        assert_eq!(err.kind(), "BadInput");
    }

    #[test]
    fn test_already_exists_names_stage() {
        let err = GetphyloError::already_exists("out/final_loci.txt", Stage::MarkersSearched);
        let message = err.to_string();
        assert!(message.contains("out/final_loci.txt"));
        assert!(message.contains("MARKERS_SEARCHED"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GetphyloError = io_err.into();
        assert!(matches!(err, GetphyloError::Io(_)));
    }
}
