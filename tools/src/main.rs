//! rosie: command-line runner for the suspicion pipelines.
//!
//! Usage:
//!   rosie run chamber_of_deputies --output /tmp/serenata-data
//!   rosie run federal_senate --skip-loaded-files
//!   rosie test core
//!   rosie generate --output ./data --seed 7 --from 2015 --to 2018

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rosie_core::{
    directory_adapter::{DirectoryAdapter, MirrorFetcher, OfflineFetcher, SourceFetcher},
    synthetic::{self, SyntheticConfig},
    Pipeline, RunContext, SuspicionEngine,
};
use std::path::PathBuf;
use std::process::{Command, ExitCode};

const DEFAULT_OUTPUT: &str = "/tmp/serenata-data";

/// Hi, I am Rosie. I flag suspicious reimbursements filed by public officials.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch data, score every year and write the suspicions report
    Run {
        #[arg(value_enum)]
        pipeline: PipelineArg,

        /// Data directory for sources, models and the report
        #[arg(long, default_value = DEFAULT_OUTPUT, value_name = "DIR")]
        output: PathBuf,

        /// Do not refresh source files already present
        #[arg(long)]
        skip_loaded_files: bool,

        /// Refresh source files by copying them from this directory
        #[arg(long, value_name = "DIR")]
        mirror: Option<PathBuf>,
    },
    /// Run a test suite; exits non-zero when any test fails
    Test {
        #[arg(value_enum)]
        suite: Option<SuiteArg>,
    },
    /// Write a synthetic chamber-of-deputies dataset
    Generate {
        #[arg(long, default_value = DEFAULT_OUTPUT, value_name = "DIR")]
        output: PathBuf,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// First year, inclusive
        #[arg(long, default_value_t = 2016)]
        from: i32,

        /// Last year, exclusive
        #[arg(long, default_value_t = 2019)]
        to: i32,

        #[arg(long, default_value_t = 20)]
        applicants: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "snake_case")]
enum PipelineArg {
    ChamberOfDeputies,
    FederalSenate,
}

impl From<PipelineArg> for Pipeline {
    fn from(arg: PipelineArg) -> Self {
        match arg {
            PipelineArg::ChamberOfDeputies => Pipeline::ChamberOfDeputies,
            PipelineArg::FederalSenate => Pipeline::FederalSenate,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "snake_case")]
enum SuiteArg {
    ChamberOfDeputies,
    FederalSenate,
    Core,
}

impl SuiteArg {
    fn test_target(&self) -> &'static str {
        match self {
            SuiteArg::ChamberOfDeputies => "chamber_of_deputies",
            SuiteArg::FederalSenate => "federal_senate",
            SuiteArg::Core => "core",
        }
    }
}

fn main() -> Result<ExitCode> {
    init_logging();
    let args = Args::parse();

    match args.command {
        Commands::Run {
            pipeline,
            output,
            skip_loaded_files,
            mirror,
        } => {
            run(pipeline.into(), output, skip_loaded_files, mirror)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Test { suite } => test(suite),
        Commands::Generate {
            output,
            seed,
            from,
            to,
            applicants,
        } => {
            let config = SyntheticConfig {
                seed,
                years: from..to,
                applicants,
                ..SyntheticConfig::default()
            };
            synthetic::write_chamber_files(&synthetic::generate(&config), &output)?;
            log::info!("Synthetic dataset written to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `RUST_LOG` wins; the legacy `LOG_LEVEL` is honoured otherwise.
fn init_logging() {
    let level = std::env::var("LOG_LEVEL")
        .map(|l| l.to_lowercase())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(
    pipeline: Pipeline,
    output: PathBuf,
    skip_loaded_files: bool,
    mirror: Option<PathBuf>,
) -> Result<()> {
    let ctx = RunContext::for_pipeline(pipeline, &output)?;
    let fetcher: Box<dyn SourceFetcher> = match mirror {
        Some(dir) => Box::new(MirrorFetcher::new(dir)),
        None => Box::new(OfflineFetcher),
    };
    let adapter = DirectoryAdapter::new(pipeline, &output, ctx.config.starting_year)
        .skip_loaded_files(skip_loaded_files)
        .with_fetcher(fetcher);

    log::info!("Running {pipeline} pipeline in {}", output.display());
    let mut engine = SuspicionEngine::new(ctx, adapter);
    let report = engine
        .run()
        .with_context(|| format!("{pipeline} pipeline failed"))?;
    log::info!("Done! See more at: {}", report.display());
    Ok(())
}

fn test(suite: Option<SuiteArg>) -> Result<ExitCode> {
    let mut command = Command::new(std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()));
    command.args(["test", "-p", "rosie-core"]);
    if let Some(suite) = suite {
        command.args(["--test", suite.test_target()]);
    }

    let status = command.status().context("cannot launch cargo test")?;
    if status.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        log::error!("Test suite failed: {status}");
        Ok(ExitCode::FAILURE)
    }
}
