//! Command-line interface
//!
//! Thin plumbing around the core: `ingest` loads a specification into the
//! store, `serve` runs the MCP stdio server (optionally ingesting first).

use crate::config::{self, AppConfig};
use crate::errors::Result;
use crate::observability::{init_logging, init_metrics};
use crate::startup;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "apiscope",
    version = crate::VERSION,
    about = "OpenAPI knowledge server for AI agents over the Model Context Protocol"
)]
pub struct Cli {
    /// Path to a configuration file (YAML or TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse and store an OpenAPI/Swagger specification
    Ingest {
        /// Path to the specification file (.json, .yaml, .yml)
        spec: PathBuf,
    },
    /// Run the MCP server over stdio
    Serve {
        /// Specification to ingest before serving
        #[arg(long)]
        spec: Option<PathBuf>,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config: AppConfig = config::load_config(cli.config.as_deref())?;

    let _log_guard = init_logging(&config.observability)?;
    init_metrics(&config.observability)?;

    match cli.command {
        Command::Ingest { spec } => {
            let state = startup::build_state(config).await?;
            let summary = startup::ingest_and_index(&state, &spec).await?;
            println!(
                "Ingested document {} ({} endpoints, {} schemas, {} errors, {} warnings){}",
                summary.document_id,
                summary.endpoints,
                summary.schemas,
                summary.errors,
                summary.warnings,
                if summary.created { "" } else { " [already present]" },
            );
            Ok(())
        }
        Command::Serve { spec } => {
            let state = startup::build_state(config).await?;
            if let Some(spec) = spec {
                startup::ingest_and_index(&state, &spec).await?;
            }
            startup::run_server(state).await
        }
    }
}
