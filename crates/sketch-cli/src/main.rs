//! Sketch Search
//!
//! Shot-to-asset retrieval and assignment.
//!
//! # Usage
//!
//! ```bash
//! sketch retrieve --queries shot_queries.json [--top-k N] [--out matches.json]
//! sketch assign --scene scene.json --matches matches.json [--out scene.with_assets.json]
//! sketch run --scene scene.json --queries shot_queries.json [--out FILE] [--matches-out FILE]
//! sketch index --catalog assets.json [--reset]
//! sketch status
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/sketch-search/config.toml)
//! 3. Environment variables (SKETCH_*, e.g. SKETCH_INDEX__URL)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use sketch_cli::{
    assign, index, init_logging, load_settings, retrieve, run, show_status, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings)?;

    match cli.command {
        Commands::Retrieve {
            queries,
            top_k,
            out,
        } => {
            retrieve(&settings, &queries, top_k, out.as_deref()).await?;
        }
        Commands::Assign {
            scene,
            matches,
            out,
        } => {
            assign(&settings, &scene, &matches, out.as_deref())?;
        }
        Commands::Run {
            scene,
            queries,
            top_k,
            out,
            matches_out,
        } => {
            run(
                &settings,
                &scene,
                &queries,
                top_k,
                out.as_deref(),
                matches_out.as_deref(),
            )
            .await?;
        }
        Commands::Index { catalog, reset } => {
            index(&settings, &catalog, reset).await?;
        }
        Commands::Status => {
            show_status(&settings).await?;
        }
    }

    Ok(())
}
