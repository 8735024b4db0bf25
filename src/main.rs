//! Tufted - build tool for the Tufted blog template.
//!
//! Turns a `content/` tree of Markdown or Typst documents into a static site.

mod build;
mod cli;
mod compiler;
mod config;
mod logger;
mod serve;
mod utils;

use anyhow::Result;
use build::{build_html, build_pdf, build_site, clean};
use clap::Parser;
use cli::{Cli, Commands};
use compiler::copy_assets;
use config::SiteConfig;
use serve::serve_site;
use std::{path::Path, process::ExitCode};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let ok = match &cli.command {
        Commands::Build { force } => build_site(&config, *force)?,
        Commands::Html { force } => build_html(&config, *force)?,
        Commands::Pdf { force } => build_pdf(&config, *force)?,
        Commands::Assets => copy_assets(&config),
        Commands::Clean => clean(&config).map(|()| true)?,
        Commands::Preview { .. } => serve_site(&config).map(|()| true)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("."));

    let mut config = SiteConfig::load(root, &cli.config, cli.requires_config())?;
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}
