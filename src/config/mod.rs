//! Site configuration management for `config.toml`.
//!
//! The file plays two roles. As a whole it is site data: the parsed table is
//! handed to page templates as `config`. Two reserved sections configure the
//! build itself:
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[build]`   | Source format, directories, template, typst      |
//! | `[serve]`   | Preview server (port, browser, live-reload tool) |
//!
//! # Example
//!
//! ```toml
//! title = "My Blog"
//! author = "Alice"
//!
//! [build]
//! format = "markdown"
//! output = "_site"
//!
//! [serve]
//! port = 8000
//! ```

mod build;
pub mod defaults;
mod error;
mod serve;

pub use build::{BuildConfig, SourceFormat, TypstConfig};
pub use error::ConfigError;
pub use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Output subdirectory that mirrors the assets directory.
pub const ASSETS_SUBDIR: &str = "assets";

/// Base template of typst sites, tracked as a global dependency.
const TYPST_BASE_TEMPLATE: &str = "base.typ";

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration, built once per process and passed by reference.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
pub struct SiteConfig {
    /// Absolute project root
    #[serde(skip)]
    pub root: PathBuf,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// The whole parsed file, exposed to templates
    #[serde(skip)]
    pub site: toml::Table,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let site: toml::Table = content.parse().map_err(ConfigError::Toml)?;
        let mut config: SiteConfig = toml::Value::Table(site.clone())
            .try_into()
            .map_err(ConfigError::Toml)?;
        config.site = site;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `config_name` under `root` and resolve every path against the root.
    ///
    /// A missing file is an error when `required`; otherwise defaults are used.
    pub fn load(root: &Path, config_name: &Path, required: bool) -> Result<Self> {
        let root = Self::normalize_path(root);
        let config_path = root.join(config_name);

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else if required {
            bail!(ConfigError::NotFound(config_path));
        } else {
            Self::default()
        };

        config.config_path = config_path;
        config.resolve_paths(&root);
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn update_with_cli(&mut self, cli: &Cli) {
        Self::update_option(&mut self.build.format, cli.format.as_ref());

        if let Commands::Preview { port, no_open } = &cli.command {
            Self::update_option(&mut self.serve.port, port.as_ref());
            if *no_open {
                self.serve.open = false;
            }
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Join every configured directory onto the root.
    fn resolve_paths(&mut self, root: &Path) {
        self.root = root.to_path_buf();

        let build = &mut self.build;
        build.content = root.join(&build.content);
        build.output = root.join(&build.output);
        build.assets = root.join(&build.assets);
        build.templates = root.join(&build.templates);
        build.typst.font_path = root.join(&build.typst.font_path);

        if let Some(deps) = build.deps.as_mut() {
            for dep in deps.iter_mut() {
                *dep = root.join(&*dep);
            }
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Files whose modification time invalidates every target.
    pub fn dependencies(&self) -> Vec<PathBuf> {
        if let Some(deps) = &self.build.deps {
            return deps.clone();
        }

        let template = match self.build.format {
            SourceFormat::Markdown => self.build.templates.join(&self.build.template),
            SourceFormat::Typst => self.build.templates.join(TYPST_BASE_TEMPLATE),
        };
        vec![self.config_path.clone(), template]
    }

    /// Output directory holding the mirrored assets.
    pub fn assets_output(&self) -> PathBuf {
        self.build.output.join(ASSETS_SUBDIR)
    }

    /// Absolute URL of a file in the assets directory.
    pub fn asset_href(name: &str) -> String {
        format!("/{ASSETS_SUBDIR}/{}", name.trim_start_matches('/'))
    }

    /// Validate configuration before a build
    pub fn validate(&self) -> Result<()> {
        if self.build.template.is_empty() {
            bail!(ConfigError::Validation(
                "[build.template] must not be empty".into()
            ));
        }

        if self.build.format == SourceFormat::Typst && self.build.typst.command.is_empty() {
            bail!(ConfigError::Validation(
                "[build.typst.command] must have at least one element".into()
            ));
        }

        Ok(())
    }

    /// Check that the program of `command` can be found on `PATH`.
    pub fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
