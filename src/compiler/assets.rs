//! Static asset mirroring and content passthrough.
//!
//! Two independent phases, each logged and counted on its own:
//!
//! 1. `assets/` replaces `<output>/assets` wholesale (delete, then copy).
//! 2. Every published non-document file under `content/` is copied to the
//!    same relative path in `<output>`.
//!
//! Copies keep permissions and access/modification times.

use super::{collect_visible_files, is_document};
use crate::{config::SiteConfig, log};
use anyhow::{Context, Result};
use std::{
    fs::{self, File, FileTimes},
    io,
    path::Path,
};
use walkdir::WalkDir;

/// Copy static assets and content passthrough files.
///
/// Returns false if either phase failed; failures are logged, not raised.
pub fn copy_assets(config: &SiteConfig) -> bool {
    let mut ok = true;

    let assets = &config.build.assets;
    if assets.is_dir() {
        match mirror_dir(assets, &config.assets_output()) {
            Ok(count) => log!("assets"; "copied {} files from {}", count, assets.display()),
            Err(err) => {
                log!("error"; "failed to copy assets: {:#}", err);
                ok = false;
            }
        }
    }

    let content = &config.build.content;
    if content.is_dir() {
        match copy_content_files(content, &config.build.output) {
            Ok(count) => log!("assets"; "copied {} files from {}", count, content.display()),
            Err(err) => {
                log!("error"; "failed to copy content files: {:#}", err);
                ok = false;
            }
        }
    }

    ok
}

/// Replace `dst` with a copy of `src`.
fn mirror_dir(src: &Path, dst: &Path) -> Result<usize> {
    if dst.exists() {
        fs::remove_dir_all(dst).with_context(|| format!("Failed to remove {}", dst.display()))?;
    }

    let mut count = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let target = dst.join(entry.path().strip_prefix(src)?);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            copy_file(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            count += 1;
        }
    }
    Ok(count)
}

/// Copy published non-document files from `content` into `output`.
fn copy_content_files(content: &Path, output: &Path) -> Result<usize> {
    let files: Vec<_> = collect_visible_files(content)
        .into_iter()
        .filter(|path| !is_document(path))
        .collect();

    for path in &files {
        let target = output.join(path.strip_prefix(content)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        copy_file(path, &target).with_context(|| format!("Failed to copy {}", path.display()))?;
    }
    Ok(files.len())
}

/// Copy contents and permissions, then carry over the file times.
fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst)?;

    let meta = src.metadata()?;
    let times = FileTimes::new()
        .set_accessed(meta.accessed()?)
        .set_modified(meta.modified()?);

    // Read-only sources produce read-only copies
    let file = File::options()
        .write(true)
        .open(dst)
        .or_else(|_| File::open(dst))?;
    file.set_times(times)
}
