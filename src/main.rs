//! Attestation demo driver.
//!
//! Provisions the demo's trust chain (worker keys, sealed and registered CA
//! cert, random KEK) and then encrypts and searches the input data through the
//! worker client, stopping at the first failed stage.
use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod kek;
mod paths;
mod pipeline;
mod report;
mod stage;
mod util;
mod workspace;

use cli::RootArgs;
use config::DemoConfig;
use pipeline::{Pipeline, PipelineOutcome, ProcessRunner};
use report::build_summary;
use stage::build_stages;

fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    init_tracing(args.verbose)?;
    let _span = tracing::info_span!("attdemo").entered();

    let config = DemoConfig::from_args(&args)?;
    tracing::debug!(demo_dir = %config.paths.root().display(), "resolved demo layout");
    workspace::ensure_out_dir(&config.paths.out_dir())?;

    let mut pipeline = Pipeline::new(build_stages(&config), ProcessRunner);
    let outcome = pipeline.run()?;

    if args.json {
        let summary = build_summary(
            pipeline.state(),
            pipeline.stages(),
            pipeline.records(),
            &config.paths,
        );
        let text = serde_json::to_string_pretty(&summary).context("serialize run summary")?;
        println!("{text}");
    }

    Ok(match outcome {
        PipelineOutcome::Succeeded => ExitCode::SUCCESS,
        PipelineOutcome::Failed { code, .. } => ExitCode::from(code),
    })
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("init logging: {err}"))
}
