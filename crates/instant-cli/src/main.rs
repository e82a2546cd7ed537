mod cli;
mod commands;
mod config;
mod view;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, ProxyCommands};

#[tokio::main]
async fn main() -> Result<()> {
    instant_runtime::init_logging();

    let cli = Cli::parse();

    // Init does not need a config file
    if let Commands::Init { path } = &cli.command {
        return commands::init::run_init(path);
    }

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Search {
            term,
            page,
            per_package,
        } => commands::search::run_search(&config, &term, page, per_package).await,
        Commands::Open { url } => commands::search::run_open(&config, &url).await,
        Commands::Proxy { action } => match action {
            ProxyCommands::Serve { host, port, memory } => {
                commands::proxy::run_serve(&config.proxy, host, port, memory).await
            }
            ProxyCommands::Install => commands::proxy::run_install(&config.proxy).await,
            ProxyCommands::Activate => commands::proxy::run_activate(&config.proxy),
        },
        Commands::Init { .. } => Ok(()),
    }
}
