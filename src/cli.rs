//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default port of `serve` and `preview`
pub const DEFAULT_PORT: u16 = 7000;

/// moonlog static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root containing config.lua
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site into the output directory
    Build {
        /// Remove the configured clean targets first
        #[arg(long)]
        clean: bool,
    },

    /// Remove the configured clean targets from the output directory
    Clean,

    /// Serve the output directory
    Serve {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Serve the output directory and render one entry live at /preview
    Preview {
        /// Entry file to preview
        #[arg(long)]
        path: PathBuf,

        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Create a new entry interactively
    New,

    /// Create a new project from the starter site
    Site {
        /// Directory to create the project in, related to `root`
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },
}
