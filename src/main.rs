use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use swarm::batch::{Batch, BatchReport};
use swarm::config::Config;
use swarm::orchestration::{Orchestrator, ShellUnitFactory, Strategy};
use swarm::Result;

/// Swarm - run batches of shell work units in parallel, in sequence, or by dependency graph
#[derive(Parser, Debug)]
#[command(name = "swarm")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    SWARM_DEBUG=1            Enable debug logging (alternative to --debug)\n    SWARM_MAX_CONCURRENT=N   Override max_concurrent from the config file")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.swarm/swarm.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a batch file
    Run {
        /// Batch file (.toml or .json)
        file: PathBuf,

        /// Execution strategy: parallel, sequential or graph
        #[arg(long, short = 's')]
        strategy: Option<Strategy>,

        /// Concurrency bound for the parallel strategy
        #[arg(long, short = 'n')]
        max_concurrent: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a batch file without running it
    Validate {
        /// Batch file (.toml or .json)
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    swarm::log::init_with_debug(cli.debug);

    match cli.command {
        Command::Run {
            file,
            strategy,
            max_concurrent,
            json,
        } => run_batch(file, strategy, max_concurrent, json),
        Command::Validate { file } => run_validate(file),
        Command::Config => run_config(),
    }
}

fn run_batch(
    file: PathBuf,
    strategy: Option<Strategy>,
    max_concurrent: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = Config::load()?;
    let batch = Batch::load(&file)?;
    let strategy = batch.resolve_strategy(strategy, config.default_strategy);
    let max_concurrent = max_concurrent
        .or(batch.max_concurrent)
        .unwrap_or(config.max_concurrent);
    info!(
        file = %file.display(),
        %strategy,
        max_concurrent,
        tasks = batch.len(),
        "Running batch"
    );

    let factory = Arc::new(ShellUnitFactory::from_config(&config));
    let orchestrator = Orchestrator::from_config(factory, &config);

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(batch.run(&orchestrator, strategy, max_concurrent))?;

    print_report(&report, json)?;
    if !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else if !report.entries.is_empty() {
        println!("{}", report.render_text());
        println!();
        println!(
            "{} strategy: {} of {} task(s) succeeded",
            report.strategy,
            report.entries.len() - report.failed(),
            report.entries.len()
        );
    } else {
        println!("No tasks to run");
    }
    Ok(())
}

fn run_validate(file: PathBuf) -> Result<()> {
    let batch = Batch::load(&file)?;
    batch.validate()?;
    println!("{}: {} task(s), valid", file.display(), batch.len());
    Ok(())
}

fn run_config() -> Result<()> {
    let config = Config::load()?;
    print!("{}", config.to_toml()?);
    Ok(())
}
