//! getphylo core library
//!
//! Checkpointed marker-gene pipeline: sequence extraction, marker discovery
//! and thresholding, per-marker alignment, reconciliation of the per-marker
//! alignments into one partitioned alignment, and tree building. External
//! programs are reached through [`tools::ToolRunner`].

pub mod align;
pub mod checkpoint;
pub mod combine;
pub mod error;
pub mod extract;
pub mod io;
pub mod layout;
pub mod matrix;
pub mod organism;
pub mod pipeline;
pub mod pool;
pub mod screen;
pub mod tools;
pub mod trees;
pub mod types;

// Re-export commonly used types and functions
pub use checkpoint::{Checkpoint, Stage};
pub use combine::{reconcile, CombinedAlignment, PartitionMap, PerMarkerAlignment, Reconciliation};
pub use error::{GetphyloError, Result};
pub use layout::OutputLayout;
pub use matrix::PresenceAbsenceMatrix;
pub use organism::OrganismIndex;
pub use pipeline::{run, PipelineConfig, PipelineReport};
pub use screen::Thresholds;
pub use tools::{ProcessRunner, SearchParams, ToolInvocation, ToolPaths, ToolRunner};
pub use trees::{TreeMethod, TreeOptions};
pub use types::{HitRecord, NamedSequence, Organism, SequenceCollection, MISSING_DATA};

/// Version information for the getphylo core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
