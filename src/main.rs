use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use lpa_community::community::Communities;
use lpa_community::config::LpaConfig;
use lpa_community::graph::Graph;
use lpa_community::logger::init_logger;
use lpa_community::output::{write_json, write_tsv, Report};
use lpa_community::propagation::{Convergence, LabelPropagation, TieBreak, UpdateMode};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TieBreakArg {
    FirstSeen,
    LowestLabel,
    Seeded,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConvergenceArg {
    LabelChanged,
    IdentifierOrder,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Tsv,
}

/// Detect communities in a weighted edge list with label propagation.
#[derive(Parser, Debug)]
#[command(name = "lpa_community", version)]
struct Cli {
    /// Tab-separated edge list: `src<TAB>dst[<TAB>weight]` per line
    input: PathBuf,

    /// YAML run configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of propagation rounds
    #[arg(short = 'n', long)]
    max_iterations: Option<u32>,

    /// Tie-break policy among equally heavy labels
    #[arg(long, value_enum)]
    tie_break: Option<TieBreakArg>,

    /// Seed for the `seeded` tie-break policy
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Stability criterion
    #[arg(long, value_enum)]
    convergence: Option<ConvergenceArg>,

    /// Evaluate each round against a frozen snapshot, in parallel
    #[arg(long)]
    synchronous: bool,

    /// Result format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn resolve_config(&self) -> Result<LpaConfig> {
        let mut config = match &self.config {
            Some(path) => LpaConfig::from_yaml_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => LpaConfig::default(),
        };
        let options = &mut config.propagation;
        if let Some(max_iterations) = self.max_iterations {
            options.max_iterations = max_iterations;
        }
        if let Some(tie_break) = self.tie_break {
            options.tie_break = match tie_break {
                TieBreakArg::FirstSeen => TieBreak::FirstSeen,
                TieBreakArg::LowestLabel => TieBreak::LowestLabel,
                TieBreakArg::Seeded => TieBreak::Seeded(self.seed),
            };
        }
        if let Some(convergence) = self.convergence {
            options.convergence = match convergence {
                ConvergenceArg::LabelChanged => Convergence::LabelChanged,
                ConvergenceArg::IdentifierOrder => Convergence::IdentifierOrder,
            };
        }
        if self.synchronous {
            options.update_mode = UpdateMode::Synchronous;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
        Ok(config)
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    init_logger(&config.log_level, config.log_file.as_deref())
        .map_err(|err| anyhow::anyhow!("failed to initialize logger: {}", err))?;

    let start_load = Instant::now();
    let (graph, mut labels) = Graph::from_file(&cli.input)
        .with_context(|| format!("failed to load graph {}", cli.input.display()))?;
    let load_time = start_load.elapsed();

    let start_lp = Instant::now();
    let stats = LabelPropagation::new(config.propagation.clone()).propagate(&graph, &mut labels);
    let lp_time = start_lp.elapsed();

    let communities = Communities::from_labels(&labels);
    info!(
        "{} communities found (sizes: {}), load {:?}, propagation {:?}",
        communities.len(),
        communities.size_summary(),
        load_time,
        lp_time
    );

    let writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    match cli.format {
        OutputFormat::Json => write_json(writer, &Report::new(&graph, &labels, &stats)),
        OutputFormat::Tsv => write_tsv(writer, &graph, &labels),
    }
    .context("failed to write result")?;
    Ok(())
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
