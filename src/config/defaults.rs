//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn output() -> PathBuf {
        "_site".into()
    }

    pub fn assets() -> PathBuf {
        "assets".into()
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn template() -> String {
        "base.html".into()
    }

    pub fn highlight_theme() -> String {
        "InspiredGitHub".into()
    }

    pub mod typst {
        use std::path::PathBuf;

        pub fn command() -> Vec<String> {
            vec!["typst".into()]
        }

        pub fn font_path() -> PathBuf {
            "assets/fonts".into()
        }

        pub fn favicon() -> Option<String> {
            Some("favicon.ico".into())
        }

        pub fn scripts() -> Vec<String> {
            vec!["theme-toggle.js".into(), "sidenotes.js".into()]
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8000
    }

    pub fn livereload() -> Vec<String> {
        vec!["uvx".into(), "livereload".into()]
    }
}
