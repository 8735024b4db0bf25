//! Typst pages, compiled by the external `typst` CLI.
//!
//! HTML and PDF are both written to stdout (`-`) and saved by us, so a
//! failed compile never leaves a partial target behind. Any nonzero exit
//! aborts the pass ([`FailurePolicy::Hard`]).

use super::{Converter, FailurePolicy, PdfExport};
use crate::{
    config::{SiteConfig, SourceFormat},
    exec,
    utils::{
        exec::FilterRule,
        head::{head_block, inject_head},
        minify::minify_html,
    },
};
use anyhow::{Context, Result};
use std::{fs, path::Path};

/// Typst filter: skip known warnings.
const TYPST_FILTER: FilterRule = FilterRule::new(&[
    "warning: html export is under active development",
    "and incomplete",
    "= hint: its behaviour may change at any time",
    "= hint: do not rely on this feature for production use cases",
    "= hint: see https://github.com/typst/typst/issues/5512",
    "for more information",
    "warning: elem",
]);

pub struct TypstConverter<'a> {
    config: &'a SiteConfig,
    /// Pre-rendered `<head>` block shared by every page.
    head: Vec<u8>,
}

impl<'a> TypstConverter<'a> {
    /// Fails when the typst command is not installed.
    pub fn new(config: &'a SiteConfig) -> Result<Self> {
        SiteConfig::check_command_installed("[build.typst.command]", &config.build.typst.command)?;

        Ok(Self {
            config,
            head: head_block(&config.build.typst)?,
        })
    }

    fn compile_html(&self, source: &Path) -> Result<Vec<u8>> {
        let root = self.config.root.as_path();
        let output = exec!(
            filter=&TYPST_FILTER;
            root;
            &self.config.build.typst.command;
            "compile",
            "--root", root,
            "--font-path", &self.config.build.typst.font_path,
            "--features", "html", "--format", "html",
            source, "-"
        )?;
        Ok(output.stdout)
    }

    fn compile_pdf(&self, source: &Path) -> Result<Vec<u8>> {
        let root = self.config.root.as_path();
        let output = exec!(
            filter=&TYPST_FILTER;
            root;
            &self.config.build.typst.command;
            "compile",
            "--root", root,
            "--font-path", &self.config.build.typst.font_path,
            source, "-"
        )?;
        Ok(output.stdout)
    }
}

impl Converter for TypstConverter<'_> {
    fn format(&self) -> SourceFormat {
        SourceFormat::Typst
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Hard
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        let html = self.compile_html(source)?;
        let html = inject_head(&html, &self.head);
        let html = minify_html(&html, self.config);

        fs::write(target, html).with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(())
    }
}

impl PdfExport for TypstConverter<'_> {
    fn export_pdf(&self, source: &Path, target: &Path) -> Result<()> {
        let pdf = self.compile_pdf(source)?;
        fs::write(target, pdf).with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{
        convert_all, export_all, pdf_sources,
        tests::{site_config, write_file},
    };
    use tempfile::TempDir;

    /// Fake compiler: prints the source file (the argument before `-`).
    const ECHO_SOURCE: &str = r#"for arg; do src=$last; last=$arg; done; cat "$src""#;

    fn typst_config(dir: &Path, script: &str) -> SiteConfig {
        let mut config = site_config(dir);
        config.build.format = SourceFormat::Typst;
        config.build.typst.command = vec!["sh".into(), "-c".into(), script.into(), "sh".into()];
        config
    }

    #[test]
    fn test_convert_injects_head() {
        let dir = TempDir::new().unwrap();
        let config = typst_config(dir.path(), ECHO_SOURCE);
        let source = write_file(
            &config.build.content,
            "index.typ",
            "<html><head><title>T</title></head><body>ok</body></html>",
        );
        let target = dir.path().join("index.html");

        TypstConverter::new(&config)
            .unwrap()
            .convert(&source, &target)
            .unwrap();
        let html = fs::read_to_string(target).unwrap();

        assert!(html.starts_with("<html><head><title>T</title><link rel=\"icon\""));
        assert!(html.contains("<script src=\"/assets/sidenotes.js\"> </script></head>"));
        assert!(html.ends_with("<body>ok</body></html>"));
    }

    #[test]
    fn test_compile_arguments() {
        let dir = TempDir::new().unwrap();
        let config = typst_config(dir.path(), r#"printf '%s\n' "$@""#);
        let source = write_file(&config.build.content, "index.typ", "");
        let converter = TypstConverter::new(&config).unwrap();

        let html = String::from_utf8(converter.compile_html(&source).unwrap()).unwrap();
        let args: Vec<_> = html.lines().collect();
        let root = config.root.to_str().unwrap();
        let font_path = config.build.typst.font_path.to_str().unwrap();
        assert_eq!(
            args,
            vec![
                "compile", "--root", root, "--font-path", font_path, "--features", "html",
                "--format", "html", source.to_str().unwrap(), "-",
            ]
        );

        let pdf = String::from_utf8(converter.compile_pdf(&source).unwrap()).unwrap();
        assert!(!pdf.contains("--features"));
        assert!(pdf.ends_with("-\n"));
    }

    #[test]
    fn test_failure_aborts_pass() {
        let dir = TempDir::new().unwrap();
        let config = typst_config(
            dir.path(),
            "echo run >> calls.txt; echo 'error: unknown variable: foo' >&2; exit 1",
        );
        write_file(&config.build.content, "a.typ", "");
        write_file(&config.build.content, "b.typ", "");

        let converter = TypstConverter::new(&config).unwrap();
        let err = convert_all(&converter, &config, false).unwrap_err();

        assert!(format!("{err:#}").contains("error: unknown variable: foo"));
        let calls = fs::read_to_string(dir.path().join("calls.txt")).unwrap();
        assert_eq!(calls.lines().count(), 1);
        assert!(!config.build.output.join("a.html").exists());
        assert!(!config.build.output.join("b.html").exists());
    }

    #[test]
    fn test_export_pdf_subset() {
        let dir = TempDir::new().unwrap();
        let config = typst_config(dir.path(), ECHO_SOURCE);
        write_file(&config.build.content, "index.typ", "<html></html>");
        write_file(&config.build.content, "cv/resume-PDF.typ", "%PDF-1.7");

        let converter = TypstConverter::new(&config).unwrap();
        let sources = pdf_sources(&config.build.content, "typ");
        let report = export_all(&converter, &sources, &config, false).unwrap();

        assert_eq!(report.converted, 1);
        assert_eq!(
            fs::read(config.build.output.join("cv/resume-PDF.pdf")).unwrap(),
            b"%PDF-1.7"
        );
        assert!(!config.build.output.join("index.pdf").exists());
    }

    #[test]
    fn test_missing_compiler() {
        let dir = TempDir::new().unwrap();
        let mut config = site_config(dir.path());
        config.build.typst.command = vec!["tufted-no-such-typst".into()];

        assert!(TypstConverter::new(&config).is_err());
    }
}
