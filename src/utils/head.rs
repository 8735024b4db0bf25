//! `<head>` injection for compiled typst pages.
//!
//! The typst HTML exporter knows nothing about the site's client-side assets,
//! so a fixed block (favicon link plus one `<script>` per registered script)
//! is spliced in front of the first literal `</head>`. This is plain text
//! substitution: a page without `</head>` is returned unchanged.

use crate::config::{SiteConfig, TypstConfig};
use anyhow::Result;
use quick_xml::{
    Writer,
    events::{BytesEnd, BytesStart, BytesText, Event},
};
use std::{borrow::Cow, io::Cursor, path::Path};

type XmlWriter = Writer<Cursor<Vec<u8>>>;

const HEAD_CLOSE: &[u8] = b"</head>";

/// Render the block injected into every typst page.
pub fn head_block(typst: &TypstConfig) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    if let Some(icon) = &typst.favicon {
        let href = SiteConfig::asset_href(icon);
        write_empty_elem(
            &mut writer,
            "link",
            &[
                ("rel", "icon"),
                ("href", &href),
                ("type", get_icon_mime_type(Path::new(icon))),
            ],
        )?;
    }

    for script in &typst.scripts {
        write_script(&mut writer, &SiteConfig::asset_href(script))?;
    }

    Ok(writer.into_inner().into_inner())
}

/// Insert `block` immediately before the first `</head>` of `html`.
pub fn inject_head<'a>(html: &'a [u8], block: &[u8]) -> Cow<'a, [u8]> {
    let Some(pos) = html
        .windows(HEAD_CLOSE.len())
        .position(|window| window == HEAD_CLOSE)
    else {
        return Cow::Borrowed(html);
    };

    let mut out = Vec::with_capacity(html.len() + block.len());
    out.extend_from_slice(&html[..pos]);
    out.extend_from_slice(block);
    out.extend_from_slice(&html[pos..]);
    Cow::Owned(out)
}

/// Get MIME type for icon based on file extension
fn get_icon_mime_type(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| match ext.to_lowercase().as_str() {
            "png" => "image/png",
            "svg" => "image/svg+xml",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "jpg" | "jpeg" => "image/jpeg",
            _ => "image/x-icon",
        })
        .unwrap_or("image/x-icon")
}

/// Write an empty element with attributes: `<tag attr1="val1" ... />`.
fn write_empty_elem(writer: &mut XmlWriter, tag: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut elem = BytesStart::new(tag);
    for (k, v) in attrs {
        elem.push_attribute((*k, *v));
    }
    writer.write_event(Event::Empty(elem))?;
    Ok(())
}

/// Write a script element: `<script src="..."> </script>`.
fn write_script(writer: &mut XmlWriter, src: &str) -> Result<()> {
    let mut elem = BytesStart::new("script");
    elem.push_attribute(("src", src));
    writer.write_event(Event::Start(elem))?;
    // Space ensures proper HTML parsing of script tags
    writer.write_event(Event::Text(BytesText::new(" ")))?;
    writer.write_event(Event::End(BytesEnd::new("script")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> Vec<u8> {
        head_block(&TypstConfig::default()).unwrap()
    }

    #[test]
    fn test_head_block_contents() {
        let block = String::from_utf8(block()).unwrap();

        assert!(block.starts_with("<link rel=\"icon\" href=\"/assets/favicon.ico\""));
        assert!(block.contains("type=\"image/x-icon\""));
        assert!(block.contains("<script src=\"/assets/theme-toggle.js\"> </script>"));
        assert!(block.contains("<script src=\"/assets/sidenotes.js\"> </script>"));
    }

    #[test]
    fn test_head_block_without_favicon() {
        let typst = TypstConfig {
            favicon: None,
            scripts: vec!["app.js".into()],
            ..TypstConfig::default()
        };
        let block = String::from_utf8(head_block(&typst).unwrap()).unwrap();

        assert_eq!(block, "<script src=\"/assets/app.js\"> </script>");
    }

    #[test]
    fn test_inject_before_head_close() {
        let html = b"<html><head><title>T</title></head><body></body></html>";
        let out = inject_head(html, b"<script src=\"/a.js\"> </script>");

        assert_eq!(
            out.as_ref(),
            b"<html><head><title>T</title><script src=\"/a.js\"> </script></head><body></body></html>"
                .as_slice()
        );
    }

    #[test]
    fn test_inject_only_first_head_close() {
        let html = b"<head></head><pre>&lt;/head&gt;</pre><p></head></p>";
        let out = inject_head(html, b"X");

        assert_eq!(
            out.as_ref(),
            b"<head>X</head><pre>&lt;/head&gt;</pre><p></head></p>".as_slice()
        );
    }

    #[test]
    fn test_inject_without_head_is_noop() {
        let html = b"<html><body>no head</body></html>";
        let out = inject_head(html, &block());

        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.as_ref(), html.as_slice());
    }

    #[test]
    fn test_icon_mime_type() {
        assert_eq!(get_icon_mime_type(Path::new("favicon.ico")), "image/x-icon");
        assert_eq!(get_icon_mime_type(Path::new("logo.SVG")), "image/svg+xml");
        assert_eq!(get_icon_mime_type(Path::new("noext")), "image/x-icon");
    }
}
