use clap::{ArgAction, Parser};
use std::path::PathBuf;

use getphylo_core::{ProcessRunner, Stage};

mod config;
mod error;

use config::Config;
use error::{print_error_and_exit, CliResult};

#[derive(Parser, Debug)]
#[command(name = "getphylo")]
#[command(about = "getphylo - automated phylogenies from marker genes shared across genomes")]
#[command(version)]
pub struct Cli {
    /// Glob matching the input sequence files (quote it)
    #[arg(short = 'g', long, default_value = "*.fasta")]
    pub gbks: String,

    /// Organism whose single-copy genes seed marker discovery
    #[arg(short, long)]
    pub seed: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Last stage that completed in an earlier run
    #[arg(short = 'c', long, default_value = "START")]
    pub checkpoint: String,

    /// Stop collecting candidates after this many
    #[arg(short, long)]
    pub find: Option<usize>,

    /// Minimum marker length, exclusive
    #[arg(long)]
    pub min_length: Option<usize>,

    /// Maximum marker length, exclusive
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Percentage of organisms a marker must be single-copy in
    #[arg(short, long)]
    pub presence: Option<f64>,

    /// Fewest markers the run may continue with
    #[arg(long)]
    pub min_loci: Option<usize>,

    /// Most markers carried into alignment
    #[arg(long)]
    pub max_loci: Option<usize>,

    /// Worker threads
    #[arg(long)]
    pub cpus: Option<usize>,

    /// Seed for the candidate shuffle
    #[arg(long)]
    pub random_seed: Option<u64>,

    /// Drop duplicated sequence identifiers instead of failing
    #[arg(long)]
    pub ignore_bad_annotations: bool,

    /// Skip unreadable input files instead of failing
    #[arg(long)]
    pub ignore_bad_records: bool,

    /// DIAMOND minimum percent identity
    #[arg(long)]
    pub identity: Option<f64>,

    /// DIAMOND minimum query cover
    #[arg(long)]
    pub query_cover: Option<f64>,

    /// DIAMOND minimum subject cover
    #[arg(long)]
    pub subject_cover: Option<f64>,

    /// Path to the diamond executable
    #[arg(long)]
    pub diamond: Option<PathBuf>,

    /// Path to the muscle executable
    #[arg(long)]
    pub muscle: Option<PathBuf>,

    /// Path to the FastTree executable
    #[arg(long)]
    pub fasttree: Option<PathBuf>,

    /// Path to the IQ-TREE executable
    #[arg(long)]
    pub iqtree: Option<PathBuf>,

    /// Tree builder (fasttree, iqtree)
    #[arg(long)]
    pub method: Option<String>,

    /// Also build a tree for every marker
    #[arg(long)]
    pub build_all: bool,

    /// Model written on each partition line
    #[arg(long)]
    pub partition_model: Option<String>,

    /// Configuration file (defaults to ./getphylo.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Write the resolved configuration to this file and exit
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn setup_logging(verbose: u8, quiet: bool) {
    let log_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    if let Err(error) = run(&cli) {
        print_error_and_exit(&error);
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_overrides(cli)?;
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    if let Some(path) = &cli.save_config {
        config.save_to_file(path)?;
        log::info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let pipeline = config.pipeline_config(cli)?;
    log::info!("getphylo {}", getphylo_core::VERSION);
    log::debug!("Using {} worker threads", pipeline.cpus);
    if pipeline.cpus > num_cpus::get() {
        log::warn!(
            "{} threads requested but only {} CPUs are available",
            pipeline.cpus,
            num_cpus::get()
        );
    }
    if pipeline.resume == Stage::Done {
        log::warn!("Resuming from DONE; nothing will run");
    }

    let runner = ProcessRunner::new(config.tools.clone());
    let report = getphylo_core::run(&pipeline, &runner)?;

    if let Some(markers) = &report.markers {
        log::info!("{} markers across {} organisms", markers.len(), report.organisms.len());
    }
    if let Some(reconciliation) = &report.reconciliation {
        log::info!(
            "Combined alignment: {} organisms, {} columns",
            reconciliation.alignment.len(),
            reconciliation.partitions.total_length()
        );
    }
    Ok(())
}
