//! Site building orchestration.
//!
//! Coordinates document conversion, asset copying and PDF export.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── create output root
//!     │
//!     ├── build_html() ──► convert_all()   markdown: fail-soft, typst: fail-hard
//!     │
//!     ├── copy_assets()                    assets/ + content passthrough
//!     │
//!     └── build_pdf()  ──► export_all()    typst only
//! ```
//!
//! Every phase reports a success flag; the build succeeds iff all of them do.

use crate::{
    compiler::{
        MarkdownConverter, TypstConverter, convert_all, copy_assets, export_all, pdf_sources,
    },
    config::{SiteConfig, SourceFormat},
    log, logger,
};
use anyhow::{Context, Result, bail};
use std::fs;

/// Run the full build. Returns the aggregate success flag.
///
/// `Err` means the build was aborted (e.g. a typst compile failed).
pub fn build_site(config: &SiteConfig, force: bool) -> Result<bool> {
    log!("build"; "building {} site into {}", config.build.format.name(), config.build.output.display());

    let mut ok = build_html(config, force)?;
    ok &= copy_assets(config);
    if config.build.format == SourceFormat::Typst {
        ok &= build_pdf(config, force)?;
    }

    log_build_result(ok);
    Ok(ok)
}

/// Convert every document to HTML.
pub fn build_html(config: &SiteConfig, force: bool) -> Result<bool> {
    ensure_output(config)?;

    let report = match config.build.format {
        SourceFormat::Markdown => convert_all(&MarkdownConverter::new(config)?, config, force)?,
        SourceFormat::Typst => convert_all(&TypstConverter::new(config)?, config, force)?,
    };
    Ok(report.is_success())
}

/// Export PDFs for typst sources whose file name contains "pdf".
pub fn build_pdf(config: &SiteConfig, force: bool) -> Result<bool> {
    if config.build.format != SourceFormat::Typst {
        bail!("PDF export requires the typst format (set `[build] format = \"typst\"` or pass `--format typst`)");
    }

    let sources = pdf_sources(&config.build.content, SourceFormat::Typst.extension());
    if sources.is_empty() {
        log!("pdf"; "no source files matching 'pdf' found, skipping");
        return Ok(true);
    }

    ensure_output(config)?;
    let report = export_all(&TypstConverter::new(config)?, &sources, config, force)?;
    Ok(report.is_success())
}

/// Delete the output root. Missing output is not an error.
pub fn clean(config: &SiteConfig) -> Result<()> {
    let output = &config.build.output;
    if !output.exists() {
        log!("clean"; "nothing to clean, {} does not exist", output.display());
        return Ok(());
    }

    fs::remove_dir_all(output)
        .with_context(|| format!("Failed to remove output directory: {}", output.display()))?;
    log!("clean"; "removed {}", output.display());
    Ok(())
}

fn ensure_output(config: &SiteConfig) -> Result<()> {
    let output = &config.build.output;
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))
}

/// Log build result based on the aggregate flag
fn log_build_result(ok: bool) {
    if ok {
        logger::summary("build", true, "all build tasks completed");
    } else {
        logger::summary("build", false, "build finished, but some tasks failed");
    }
}
