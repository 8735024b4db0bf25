//! `[build]` section configuration.
//!
//! Contains source format, directory layout, template and typst settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Enums
// ============================================================================

/// Source document format of a site.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Markdown with YAML frontmatter, rendered through an HTML template (default).
    #[default]
    Markdown,
    /// Typst markup, compiled by the external `typst` CLI.
    Typst,
}

impl SourceFormat {
    /// File extension of documents in this format.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Typst => "typ",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Typst => "typst",
        }
    }
}

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in config.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// format = "typst"
/// content = "content"
/// output = "_site"
///
/// [build.typst]
/// command = ["typst"]
/// scripts = ["theme-toggle.js"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Source document format.
    pub format: SourceFormat,

    /// Content source directory.
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Build output directory. Owned by the build; `clean` deletes it.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Static assets directory, mirrored to `<output>/assets`.
    #[serde(default = "defaults::build::assets")]
    #[educe(Default = defaults::build::assets())]
    pub assets: PathBuf,

    /// Template directory (markdown format).
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Page template name inside `templates`.
    #[serde(default = "defaults::build::template")]
    #[educe(Default = defaults::build::template())]
    pub template: String,

    /// Minify HTML output.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,

    /// syntect theme for fenced code blocks.
    #[serde(default = "defaults::build::highlight_theme")]
    #[educe(Default = defaults::build::highlight_theme())]
    pub highlight_theme: String,

    /// Files whose modification invalidates every page.
    ///
    /// When unset, the config file and the base template are used.
    pub deps: Option<Vec<PathBuf>>,

    /// Typst compiler configuration.
    #[serde(default)]
    pub typst: TypstConfig,
}

/// `[build.typst]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct TypstConfig {
    /// Typst command and leading arguments
    #[serde(default = "defaults::build::typst::command")]
    #[educe(Default = defaults::build::typst::command())]
    pub command: Vec<String>,

    /// Directory passed as `--font-path`
    #[serde(default = "defaults::build::typst::font_path")]
    #[educe(Default = defaults::build::typst::font_path())]
    pub font_path: PathBuf,

    /// Favicon file name under the assets directory
    #[serde(default = "defaults::build::typst::favicon")]
    #[educe(Default = defaults::build::typst::favicon())]
    pub favicon: Option<String>,

    /// Client-side scripts under the assets directory, injected into `<head>`
    #[serde(default = "defaults::build::typst::scripts")]
    #[educe(Default = defaults::build::typst::scripts())]
    pub scripts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config = SiteConfig::from_str("title = \"Test\"").unwrap();

        assert_eq!(config.build.format, SourceFormat::Markdown);
        assert_eq!(config.build.content, PathBuf::from("content"));
        assert_eq!(config.build.output, PathBuf::from("_site"));
        assert_eq!(config.build.assets, PathBuf::from("assets"));
        assert_eq!(config.build.template, "base.html");
        assert!(!config.build.minify);
        assert!(config.build.deps.is_none());
        assert_eq!(config.build.typst.command, vec!["typst".to_string()]);
        assert_eq!(config.build.typst.favicon.as_deref(), Some("favicon.ico"));
        assert_eq!(config.build.typst.scripts.len(), 2);
    }

    #[test]
    fn test_build_config_typst_section() {
        let config = SiteConfig::from_str(
            r#"
            [build]
            format = "typst"
            output = "public"

            [build.typst]
            command = ["typst", "--color", "never"]
            scripts = []
            "#,
        )
        .unwrap();

        assert_eq!(config.build.format, SourceFormat::Typst);
        assert_eq!(config.build.output, PathBuf::from("public"));
        assert_eq!(config.build.typst.command.len(), 3);
        assert!(config.build.typst.scripts.is_empty());
    }

    #[test]
    fn test_unknown_build_field_rejected() {
        let result = SiteConfig::from_str(
            r#"
            [build]
            unknown_field = true
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_source_format_extension() {
        assert_eq!(SourceFormat::Markdown.extension(), "md");
        assert_eq!(SourceFormat::Typst.extension(), "typ");
        assert_eq!(SourceFormat::Typst.name(), "typst");
    }
}
