//! sparkcast - appcast generator for Sparkle

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sparkcast_cli::cmd;
use sparkcast_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Exit codes are part of the tool's contract: 0 on success, 1 on any
    // failure. clap's default usage-error exit code is 2, so parse errors
    // are mapped by hand.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let failed = error.use_stderr();
            let _ = error.print();
            std::process::exit(i32::from(failed));
        }
    };

    match cli.command {
        Commands::Add(args) => cmd::add::add(&args),
        Commands::Sign(args) => cmd::sign::sign(&args),
        Commands::Delta {
            mac_bundle,
            prev_bundle,
            delta_path,
            delta_generator_path,
        } => cmd::delta::delta(
            &mac_bundle,
            &prev_bundle,
            &delta_path,
            delta_generator_path.as_deref(),
        ),
        Commands::Print { appcast } => cmd::print::print(&appcast),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
