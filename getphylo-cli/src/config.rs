//! Configuration handling for the getphylo CLI
//!
//! Settings come from `getphylo.toml` (or `--config`), command line flags
//! override them field by field.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use getphylo_core::extract::ExtractOptions;
use getphylo_core::{PipelineConfig, SearchParams, Stage, Thresholds, ToolPaths, TreeMethod, TreeOptions};

use crate::error::{CliError, CliResult};
use crate::Cli;

pub const DEFAULT_CONFIG_FILE: &str = "getphylo.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub tools: ToolPaths,
    #[serde(default)]
    pub search: SearchParams,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub trees: TreesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Worker threads for tool batches and tree building
    #[serde(default = "default_cpus")]
    pub cpus: usize,

    /// Fixed seed for the candidate shuffle
    #[serde(default)]
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreesConfig {
    #[serde(default)]
    pub method: TreeMethod,

    /// Build one tree per marker as well as the combined tree
    #[serde(default)]
    pub build_all: bool,

    /// Substitution model written on every partition line
    #[serde(default = "default_partition_model")]
    pub partition_model: String,
}

fn default_cpus() -> usize { 1 }
fn default_partition_model() -> String { getphylo_core::combine::DEFAULT_PARTITION_MODEL.to_string() }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cpus: default_cpus(),
            random_seed: None,
        }
    }
}

impl Default for TreesConfig {
    fn default() -> Self {
        Self {
            method: TreeMethod::default(),
            build_all: false,
            partition_model: default_partition_model(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> CliResult<Self> {
        match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)
                } else {
                    log::debug!("Using default configuration");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from_file(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            CliError::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                err
            ))
        })?;
        toml::from_str(&content).map_err(|err| {
            CliError::config(format!(
                "Failed to parse configuration file {}: {}",
                path.display(),
                err
            ))
        })
    }

    pub fn save_to_file(&self, path: &Path) -> CliResult<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> CliResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Command line flags win over file values
    pub fn apply_overrides(&mut self, cli: &Cli) -> CliResult<()> {
        if let Some(cpus) = cli.cpus {
            self.general.cpus = cpus;
        }
        if cli.random_seed.is_some() {
            self.general.random_seed = cli.random_seed;
        }

        for (slot, value) in [
            (&mut self.tools.diamond, &cli.diamond),
            (&mut self.tools.muscle, &cli.muscle),
            (&mut self.tools.fasttree, &cli.fasttree),
            (&mut self.tools.iqtree, &cli.iqtree),
        ] {
            if value.is_some() {
                slot.clone_from(value);
            }
        }

        for (slot, value) in [
            (&mut self.search.identity, cli.identity),
            (&mut self.search.query_cover, cli.query_cover),
            (&mut self.search.subject_cover, cli.subject_cover),
        ] {
            if value.is_some() {
                *slot = value;
            }
        }

        let thresholds = &mut self.thresholds;
        if cli.find.is_some() {
            thresholds.find = cli.find;
        }
        if let Some(min_length) = cli.min_length {
            thresholds.min_length = min_length;
        }
        if let Some(max_length) = cli.max_length {
            thresholds.max_length = max_length;
        }
        if let Some(presence) = cli.presence {
            thresholds.presence = presence;
        }
        if let Some(min_loci) = cli.min_loci {
            thresholds.min_loci = min_loci;
        }
        if let Some(max_loci) = cli.max_loci {
            thresholds.max_loci = max_loci;
        }

        if let Some(method) = &cli.method {
            self.trees.method = method.parse()?;
        }
        if cli.build_all {
            self.trees.build_all = true;
        }
        if let Some(model) = &cli.partition_model {
            self.trees.partition_model = model.clone();
        }
        Ok(())
    }

    pub fn validate(&self) -> CliResult<()> {
        let thresholds = &self.thresholds;
        if self.general.cpus == 0 {
            return Err(CliError::validation("cpus must be at least 1"));
        }
        if !(thresholds.presence > 0.0 && thresholds.presence <= 100.0) {
            return Err(CliError::validation(format!(
                "presence must be a percentage above 0 and at most 100, got {}",
                thresholds.presence
            )));
        }
        if thresholds.min_length >= thresholds.max_length {
            return Err(CliError::validation(format!(
                "min_length ({}) must be below max_length ({})",
                thresholds.min_length, thresholds.max_length
            )));
        }
        if thresholds.min_loci > thresholds.max_loci {
            return Err(CliError::validation(format!(
                "min_loci ({}) must not exceed max_loci ({})",
                thresholds.min_loci, thresholds.max_loci
            )));
        }
        if self.trees.partition_model.trim().is_empty() {
            return Err(CliError::validation("partition_model must not be empty"));
        }
        Ok(())
    }

    /// Settings for one run, combining this configuration with the run flags
    pub fn pipeline_config(&self, cli: &Cli) -> CliResult<PipelineConfig> {
        let resume: Stage = cli.checkpoint.parse()?;
        Ok(PipelineConfig {
            inputs: cli.gbks.clone(),
            output: cli.output.clone(),
            seed: cli.seed.clone(),
            resume,
            cpus: self.general.cpus,
            random_seed: self.general.random_seed,
            thresholds: self.thresholds.clone(),
            search: self.search.clone(),
            extract: ExtractOptions {
                ignore_bad_annotations: cli.ignore_bad_annotations,
                ignore_bad_records: cli.ignore_bad_records,
            },
            trees: TreeOptions {
                method: self.trees.method,
                build_all: self.trees.build_all,
                threads: self.general.cpus,
            },
            partition_model: self.trees.partition_model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use clap::Parser;
    use tempfile::NamedTempFile;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("getphylo").chain(args.iter().copied()))
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.cpus, 1);
        assert_eq!(config.thresholds.min_length, 100);
        assert_eq!(config.thresholds.max_loci, 1000);
        assert_eq!(config.trees.method, TreeMethod::FastTree);
        assert_eq!(config.trees.partition_model, "LG");
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.general.random_seed = Some(42);
        config.tools.muscle = Some(PathBuf::from("/opt/muscle3"));
        config.thresholds.find = Some(50);

        let temp_file = NamedTempFile::new()?;
        config.save_to_file(temp_file.path())?;
        let loaded = Config::load_from_file(temp_file.path())?;

        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        fs::write(
            temp_file.path(),
            "[thresholds]\npresence = 80.0\n\n[trees]\nmethod = \"iqtree\"\n",
        )?;

        let config = Config::load(Some(temp_file.path()))?;
        assert_eq!(config.thresholds.presence, 80.0);
        assert_eq!(config.thresholds.max_length, 1000);
        assert_eq!(config.trees.method, TreeMethod::IqTree);
        assert_eq!(config.general.cpus, 1);
        Ok(())
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let err = Config::load_from_file(Path::new("/nonexistent/getphylo.toml")).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn test_flags_override_file() -> Result<()> {
        let mut config = Config::default();
        config.thresholds.presence = 80.0;
        config.general.cpus = 2;

        let args = cli(&["-p", "90", "--cpus", "8", "--method", "iqtree2", "--muscle", "m5"]);
        config.apply_overrides(&args)?;

        assert_eq!(config.thresholds.presence, 90.0);
        assert_eq!(config.general.cpus, 8);
        assert_eq!(config.trees.method, TreeMethod::IqTree);
        assert_eq!(config.tools.muscle, Some(PathBuf::from("m5")));
        // untouched values survive
        assert_eq!(config.thresholds.min_length, 100);
        Ok(())
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let mut config = Config::default();
        let err = config.apply_overrides(&cli(&["--method", "raxml"])).unwrap_err();
        assert!(matches!(err, CliError::Pipeline(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.thresholds.presence = 120.0;
        assert!(matches!(config.validate(), Err(CliError::Validation { .. })));

        config.thresholds.presence = 0.0;
        assert!(matches!(config.validate(), Err(CliError::Validation { .. })));

        config.thresholds.presence = 0.5;
        assert!(config.validate().is_ok());

        config.thresholds.presence = 100.0;
        config.thresholds.min_length = 2000;
        assert!(matches!(config.validate(), Err(CliError::Validation { .. })));
    }

    #[test]
    fn test_pipeline_config_from_flags() -> Result<()> {
        let config = Config::default();
        let args = cli(&[
            "-g",
            "genomes/*.gbk",
            "-s",
            "ref",
            "-o",
            "run1",
            "-c",
            "MARKERS_ALIGNED",
            "--ignore-bad-records",
        ]);

        let pipeline = config.pipeline_config(&args)?;
        assert_eq!(pipeline.inputs, "genomes/*.gbk");
        assert_eq!(pipeline.seed.as_deref(), Some("ref"));
        assert_eq!(pipeline.output, PathBuf::from("run1"));
        assert_eq!(pipeline.resume, Stage::MarkersAligned);
        assert!(pipeline.extract.ignore_bad_records);
        assert!(!pipeline.extract.ignore_bad_annotations);
        assert_eq!(pipeline.trees.threads, 1);
        Ok(())
    }

    #[test]
    fn test_unknown_checkpoint_is_rejected() {
        let config = Config::default();
        assert!(config.pipeline_config(&cli(&["-c", "HALFWAY"])).is_err());
    }
}
