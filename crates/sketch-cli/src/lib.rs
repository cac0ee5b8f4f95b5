//! Sketch CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (retrieve, assign, run, index, status)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    assign, index, init_logging, load_settings, retrieve, run, show_status,
};
