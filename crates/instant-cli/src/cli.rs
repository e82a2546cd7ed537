use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "instant")]
#[command(about = "Instant search client and asset cache proxy for Debian Code Search")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query and print its results once it completes
    Search {
        /// Search term, in code search query syntax
        term: String,

        /// Zero-based result page to show
        #[arg(long, default_value = "0")]
        page: usize,

        /// Group results by source package
        #[arg(long)]
        per_package: bool,
    },
    /// Resume a query from a search URL (e.g. a copied link)
    Open {
        /// Absolute URL or `/search?q=...` path
        url: String,
    },
    /// Manage the asset cache proxy
    Proxy {
        #[command(subcommand)]
        action: ProxyCommands,
    },
    /// Create a default config file
    Init {
        /// Output path
        #[arg(default_value = "instant.toml")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ProxyCommands {
    /// Install the current cache version, then serve it over HTTP
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Keep the asset cache in memory instead of the redb file
        #[arg(long)]
        memory: bool,
    },
    /// Fetch every manifest asset into the current cache version
    Install,
    /// Delete cache versions other than the current one
    Activate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_serve_flags() {
        let cli = Cli::try_parse_from(["instant", "proxy", "serve", "--memory", "--port", "9000"])
            .unwrap();
        match cli.command {
            Commands::Proxy {
                action: ProxyCommands::Serve { host, port, memory },
            } => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
                assert!(memory);
            }
            _ => panic!("expected proxy serve"),
        }
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::try_parse_from(["instant", "--config", "x.toml", "search", "foo bar"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("x.toml")));
        match cli.command {
            Commands::Search {
                term,
                page,
                per_package,
            } => {
                assert_eq!(term, "foo bar");
                assert_eq!(page, 0);
                assert!(!per_package);
            }
            _ => panic!("expected search"),
        }
    }
}
