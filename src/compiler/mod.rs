//! Document conversion for static site generation.
//!
//! This module owns the per-document pipeline shared by both source formats:
//!
//! - **markdown**: frontmatter + Markdown rendered through a page template
//! - **typst**: pages compiled by the external `typst` CLI (HTML and PDF)
//! - **assets**: static asset and content passthrough copying
//!
//! # Conversion Pass
//!
//! ```text
//! collect_sources() ──► needs_rebuild()? ──► Converter::convert()
//!       │                     │                     │
//!       ▼                     ▼                     ▼
//!  sorted sources       skipped if fresh     ConvertReport counts
//! ```
//!
//! How a failing document affects the rest of the pass is decided by the
//! converter's [`FailurePolicy`].

pub mod assets;
pub mod markdown;
pub mod typst;

pub use assets::copy_assets;
pub use markdown::MarkdownConverter;
pub use typst::TypstConverter;

use crate::{
    config::{SiteConfig, SourceFormat},
    log, logger,
};
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use walkdir::{DirEntry, WalkDir};

// ============================================================================
// Constants
// ============================================================================

/// Path segments starting with this character are drafts and never published.
pub const HIDDEN_PREFIX: char = '_';

/// Extensions of document sources, never copied verbatim.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "typ"];

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

// ============================================================================
// Discovery
// ============================================================================

/// Whether a walked entry below the walk root is hidden.
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(HIDDEN_PREFIX))
}

/// Collect every published file under `dir`, in file-name order.
///
/// Hidden directories are pruned, so nothing beneath them is visited.
pub fn collect_visible_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(DirEntry::into_path)
        .collect()
}

/// Collect published sources with extension `ext` under `content`.
pub fn collect_sources(content: &Path, ext: &str) -> Vec<PathBuf> {
    collect_visible_files(content)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == ext))
        .collect()
}

/// Whether `path` is a document source of either format.
pub fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext))
}

/// Mirror `source` from `content` into `output`, replacing its extension.
pub fn target_path(content: &Path, output: &Path, source: &Path, ext: &str) -> Result<PathBuf> {
    let relative = source
        .strip_prefix(content)
        .with_context(|| format!("{} is outside {}", source.display(), content.display()))?;
    Ok(output.join(relative).with_extension(ext))
}

// ============================================================================
// Staleness
// ============================================================================

/// Modification time, or the epoch when the file is missing.
fn mtime(path: &Path) -> SystemTime {
    path.metadata()
        .and_then(|m| m.modified())
        .unwrap_or(UNIX_EPOCH)
}

/// Decide whether `target` has to be regenerated.
///
/// A missing target is always stale. Otherwise the target is stale when the
/// source, or any existing file in `extra_deps`, is strictly newer than it.
pub fn needs_rebuild(source: &Path, target: &Path, extra_deps: &[PathBuf]) -> bool {
    if !target.exists() {
        return true;
    }

    let target_time = mtime(target);
    if mtime(source) > target_time {
        return true;
    }

    extra_deps
        .iter()
        .filter(|dep| dep.exists())
        .any(|dep| mtime(dep) > target_time)
}

// ============================================================================
// Converters
// ============================================================================

/// What a conversion pass does when one document fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure, count it, continue with the next document.
    Soft,
    /// Abort the pass with the failing document's error.
    Hard,
}

/// Convert one source document to one HTML page.
pub trait Converter {
    /// Source format handled by this converter.
    fn format(&self) -> SourceFormat;

    fn policy(&self) -> FailurePolicy;

    /// Convert `source` and write the complete result to `target`.
    ///
    /// The parent directory of `target` already exists.
    fn convert(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Converters that can also export a PDF.
pub trait PdfExport: Converter {
    fn export_pdf(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Outcome counts of one conversion pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertReport {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ConvertReport {
    /// True when no document failed.
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn log(&self, module: &str) {
        logger::summary(
            module,
            self.is_success(),
            &format!(
                "done: {} converted, {} skipped, {} failed",
                self.converted, self.skipped, self.failed
            ),
        );
    }
}

/// Convert every published source of the converter's format to HTML.
pub fn convert_all<C: Converter + ?Sized>(
    converter: &C,
    config: &SiteConfig,
    force: bool,
) -> Result<ConvertReport> {
    let ext = converter.format().extension();
    let sources = collect_sources(&config.build.content, ext);

    if sources.is_empty() {
        log!("warn"; "no .{} files found in {}", ext, config.build.content.display());
        return Ok(ConvertReport::default());
    }

    log!("html"; "building {} {} files", sources.len(), converter.format().name());
    run_pass("html", "html", &sources, converter.policy(), config, force, |src, dst| {
        converter.convert(src, dst)
    })
}

/// Published sources with extension `ext` whose file name mentions "pdf".
pub fn pdf_sources(content: &Path, ext: &str) -> Vec<PathBuf> {
    collect_sources(content, ext)
        .into_iter()
        .filter(|p| is_pdf_source(p))
        .collect()
}

/// Export a PDF for each of `sources`, collected with [`pdf_sources`].
pub fn export_all<C: PdfExport + ?Sized>(
    converter: &C,
    sources: &[PathBuf],
    config: &SiteConfig,
    force: bool,
) -> Result<ConvertReport> {
    log!("pdf"; "exporting {} files", sources.len());
    run_pass("pdf", "pdf", sources, converter.policy(), config, force, |src, dst| {
        converter.export_pdf(src, dst)
    })
}

/// Case-insensitive "pdf" match on the file name.
fn is_pdf_source(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_lowercase().contains("pdf"))
}

/// Run `convert` over `sources` in order, honoring staleness and `policy`.
fn run_pass(
    module: &str,
    target_ext: &str,
    sources: &[PathBuf],
    policy: FailurePolicy,
    config: &SiteConfig,
    force: bool,
    convert: impl Fn(&Path, &Path) -> Result<()>,
) -> Result<ConvertReport> {
    let content = &config.build.content;
    let deps = config.dependencies();
    let mut report = ConvertReport::default();

    for source in sources {
        let target = target_path(content, &config.build.output, source, target_ext)?;
        if !force && !needs_rebuild(source, &target, &deps) {
            report.skipped += 1;
            continue;
        }

        let relative = source.strip_prefix(content).unwrap_or(source);
        log!(module; "{}", relative.display());

        let result = match target.parent() {
            Some(parent) => fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))
                .and_then(|()| convert(source, &target)),
            None => convert(source, &target),
        };

        match (result, policy) {
            (Ok(()), _) => report.converted += 1,
            (Err(err), FailurePolicy::Soft) => {
                log!("error"; "{}: {:#}", relative.display(), err);
                report.failed += 1;
            }
            (Err(err), FailurePolicy::Hard) => {
                return Err(err.context(format!("Failed to compile {}", relative.display())));
            }
        }
    }

    report.log(module);
    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================
