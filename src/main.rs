//! dash-converge CLI entry point.

use anyhow::Result;
use clap::Parser;

use dash_converge::cli::commands::{config, run};
use dash_converge::cli::{handle_error, Cli, Commands};
use dash_converge::domain::models::Config;
use dash_converge::infrastructure::config::ConfigLoader;
use dash_converge::infrastructure::logging::{LogConfig, LoggerImpl};

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

async fn run_scenario(args: run::RunArgs, loaded: Result<Config>, json: bool) -> Result<bool> {
    let config = loaded?;
    // Held until the run ends so the file writer flushes.
    let _logger = LoggerImpl::init(&LogConfig::try_from(&config.logging)?)?;
    run::execute(args, config, json).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    let loaded = load_config(&cli);

    let result = match cli.command {
        Commands::Config(args) => config::execute(args, loaded, json),
        Commands::Run(args) => run_scenario(args, loaded, json).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => handle_error(err, json),
    }
}
