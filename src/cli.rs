//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use crate::config::SourceFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tufted blog template builder
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to root (default: config.toml)
    #[arg(short = 'C', long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Source format; overrides `[build] format`
    #[arg(short = 'F', long, value_enum)]
    pub format: Option<SourceFormat>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Full build: convert documents, copy assets (and export PDFs for typst)
    Build {
        /// Rebuild every document, ignoring modification times
        #[arg(short, long)]
        force: bool,
    },

    /// Convert documents to HTML only
    Html {
        /// Rebuild every document, ignoring modification times
        #[arg(short, long)]
        force: bool,
    },

    /// Export PDFs only (typst sources whose file name contains "pdf")
    Pdf {
        /// Rebuild every document, ignoring modification times
        #[arg(short, long)]
        force: bool,
    },

    /// Copy static assets only
    Assets,

    /// Delete the output directory
    Clean,

    /// Serve the output directory on a local HTTP server
    Preview {
        /// The port to listen on (default: 8000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open a browser tab
        #[arg(long = "no-open", visible_alias = "no-browser")]
        no_open: bool,
    },
}

impl Cli {
    /// Whether the command renders documents and therefore needs the config file.
    pub const fn requires_config(&self) -> bool {
        matches!(
            self.command,
            Commands::Build { .. } | Commands::Html { .. } | Commands::Pdf { .. }
        )
    }
}
