use anyhow::Result;
use clap::Parser;
use colored::*;
use std::path::Path;

mod cli;
mod config;
mod modules;
mod utils;

use config::RunConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli_args = cli::Cli::parse();

    // Profile first, then flags on top
    let mut run_config = match &cli_args.config {
        Some(path) => RunConfig::load(Path::new(path))?,
        None => RunConfig::default(),
    };
    run_config.apply_cli(&cli_args)?;
    if std::env::var_os("INTRUDER_DEBUG").is_some() {
        run_config.verbose = true;
    }

    if let Some(path) = &cli_args.save_config {
        run_config.validate()?;
        run_config.save(Path::new(path))?;
        println!("{}", format!("[+] Saved profile to {}", path).green());
        return Ok(());
    }

    modules::intruder::run(run_config, !cli_args.yes).await
}
