//! Command-line entry point.
//!
//! `setup` runs before the build, `teardown` after it. In a GitHub Actions
//! workflow these map to the main and post steps of the action.

use clap::{Parser, Subcommand};

use ccache_provision::core::output;
use ccache_provision::{Inputs, run_pre_build, run_teardown};

#[derive(Parser)]
#[command(name = "ccache-provision")]
#[command(about = "Provision ccache and persist its compilation cache in CI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, install, and configure ccache before the build
    Setup,
    /// Print statistics and persist the compilation cache after the build
    Teardown,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Setup => Inputs::from_env().and_then(|inputs| {
            run_pre_build(&inputs)?;
            Ok(())
        }),
        Commands::Teardown => run_teardown(),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            std::process::ExitCode::FAILURE
        }
    }
}
