//! CLI interface for the finops service

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::{self, Config};
use crate::service::FinOpsService;

#[derive(Parser)]
#[command(name = "finops")]
#[command(about = "In-memory FinOps service: cost ledger, budgets, and anomaly detection", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the FinOps API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Seed demo budgets on startup
        #[arg(long)]
        seed: bool,
    },
    /// Configure the service
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Print the config file path
        #[arg(long)]
        path: bool,
    },
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port, host, seed }) => serve(port, host, seed).await,
        Some(Commands::Config { show, path }) => {
            if path {
                println!("{}", config::config_path()?.display());
            }
            if show || !path {
                config::show_config()?;
            }
            Ok(())
        }
        None => serve(None, None, false).await,
    }
}

async fn serve(port: Option<u16>, host: Option<String>, seed: bool) -> Result<()> {
    let config = Config::load()?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let seed = seed || config.seed_demo_data;

    let service = Arc::new(FinOpsService::new(config));

    if seed {
        service.seed_demo_data().await?;
        println!("Seeded demo budgets");
    }

    service.spawn_sweep();

    let result = crate::server::start(service.clone(), &host, port).await;
    service.shutdown();
    result
}
