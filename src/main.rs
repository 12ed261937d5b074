use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use rootscout::adapters::fs::JsonlSource;
use rootscout::app::engine::RootScoutEngine;
use rootscout::config::load_config;
use rootscout::server::{http, mcp::RootScoutMcpServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Root-cause isolation over a live service dependency graph
#[derive(Parser, Debug)]
#[command(name = "rootscout", version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address (overrides server.addr)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Run as an MCP server over stdio
    Mcp,
    /// Replay JSONL telemetry and changes, then isolate an alert
    Replay {
        /// Normalized telemetry records, one JSON object per line
        #[arg(long)]
        telemetry: PathBuf,
        /// Change events, one JSON object per line
        #[arg(long)]
        changes: Option<PathBuf>,
        /// Service the alert fired on
        #[arg(long)]
        alert: String,
        /// Run the configured reasoner on the result
        #[arg(long)]
        analyze: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for MCP frames and CLI output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rootscout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let engine = RootScoutEngine::from_config(&config);

    match cli.command {
        Commands::Serve { addr } => {
            let addr = match addr {
                Some(addr) => addr,
                None => config
                    .server
                    .addr
                    .parse()
                    .with_context(|| format!("Invalid server.addr: {}", config.server.addr))?,
            };
            http::serve(engine, addr).await?;
        }
        Commands::Mcp => {
            RootScoutMcpServer::new(engine).serve_stdio().await?;
        }
        Commands::Replay {
            telemetry,
            changes,
            alert,
            analyze,
        } => {
            let source = JsonlSource::new(Some(telemetry), changes);
            rootscout::cli::replay(&engine, &source, &alert, analyze)?;
        }
    }

    Ok(())
}
