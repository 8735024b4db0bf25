//! HTML minification, enabled by `[build] minify`.

use crate::config::SiteConfig;
use std::borrow::Cow;

/// Minify HTML if enabled in config.
///
/// Returns `Cow::Borrowed` if minify disabled, `Cow::Owned` if minified.
pub fn minify_html<'a>(html: &'a [u8], config: &SiteConfig) -> Cow<'a, [u8]> {
    if config.build.minify {
        Cow::Owned(minify_html_inner(html))
    } else {
        Cow::Borrowed(html)
    }
}

/// Minify HTML content using `minify_html` crate.
///
/// Closing tags and the `<head>` opening tag are kept so the output stays
/// readable by the head injector and by client-side scripts.
fn minify_html_inner(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    minify_html::minify(html, &cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_minify(enabled: bool) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.build.minify = enabled;
        config
    }

    #[test]
    fn test_minify_disabled_borrows() {
        let html = b"<html>\n  <body>\n    <p>hi</p>\n  </body>\n</html>";
        let result = minify_html(html, &config_with_minify(false));

        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result.as_ref(), html.as_slice());
    }

    #[test]
    fn test_minify_enabled_shrinks() {
        let html = b"<html>\n  <head>\n  </head>\n  <body>\n    <p>hi</p>\n  </body>\n</html>";
        let result = minify_html(html, &config_with_minify(true));

        assert!(result.len() < html.len());
        assert!(String::from_utf8_lossy(&result).contains("<p>hi</p>"));
    }
}
