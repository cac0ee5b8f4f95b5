//! CLI argument parsing for the sketch binary.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Sketch Search
///
/// Retrieves catalog assets for planned shots and binds them onto the scene
/// graph.
#[derive(Parser, Debug)]
#[command(name = "sketch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/sketch-search/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve matching assets for every shot query
    Retrieve {
        /// Shot query file ({"shots": [...]})
        #[arg(short, long)]
        queries: String,

        /// Matches per shot (default from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Write the match batch here instead of stdout
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Bind a saved match batch onto a scene graph
    Assign {
        /// Scene graph file
        #[arg(short, long)]
        scene: String,

        /// Match batch file written by `retrieve`
        #[arg(short, long)]
        matches: String,

        /// Write the scene graph here instead of stdout
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Retrieve and assign in one session
    Run {
        /// Scene graph file
        #[arg(short, long)]
        scene: String,

        /// Shot query file
        #[arg(short, long)]
        queries: String,

        /// Matches per shot (default from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Write the scene graph here instead of stdout
        #[arg(short, long)]
        out: Option<String>,

        /// Also write the match batch here
        #[arg(long)]
        matches_out: Option<String>,
    },

    /// Embed and upload the asset catalog to the configured index
    Index {
        /// Asset catalog file (JSON array of assets)
        #[arg(long)]
        catalog: String,

        /// Drop and recreate the collection first
        #[arg(long)]
        reset: bool,
    },

    /// Show which embedder and index a run would use
    Status,
}
