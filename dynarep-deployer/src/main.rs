//! Deployer binary.
//!
//! Replicates the DynamoDB tables of a CloudFormation stack to other regions, or removes that
//! replication. Configuration comes from `./configuration` and `APP_` environment variables,
//! with a few command line overrides.

use std::process::ExitCode;

use clap::Parser;
use dynarep_config::Environment;
use dynarep_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::{Cli, load_deployer_config};
use crate::core::run_deployer;
use crate::error::{DeployerError, DeployerResult};

mod config;
mod core;
mod error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration, initializes tracing, starts the async runtime and runs the command.
fn run(cli: Cli) -> DeployerResult<()> {
    let deployer_config = load_deployer_config(&cli)?;

    let environment = Environment::load().map_err(DeployerError::config)?;
    let _log_flusher =
        init_tracing(env!("CARGO_BIN_NAME"), environment).map_err(DeployerError::config)?;

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run_deployer(deployer_config, cli.command));

    // Logged while the flusher is still alive.
    if let Err(err) = &result {
        error!(category = err.category(), "{err}");
    }

    result
}
