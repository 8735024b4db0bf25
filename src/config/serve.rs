//! `[serve]` section configuration.
//!
//! Contains preview server settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[serve]` section in config.toml - preview server settings.
///
/// # Example
/// ```toml
/// [serve]
/// port = 3000
/// open = false              # Do not launch a browser
/// livereload = []           # Always use the built-in server
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 8000).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Open a browser tab once the server is up.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub open: bool,

    /// Live-reload command tried first for markdown sites.
    ///
    /// Invoked as `<command...> <output> -p <port>`; empty disables it.
    #[serde(default = "defaults::serve::livereload")]
    #[educe(Default = defaults::serve::livereload())]
    pub livereload: Vec<String>,
}
