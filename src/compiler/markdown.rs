//! Markdown pages: YAML frontmatter, `pulldown-cmark` body, Jinja page template.
//!
//! # Pipeline
//!
//! ```text
//! source.md ──► split_frontmatter() ──► render_markdown() ──► minijinja ──► minify ──► target.html
//!                    │                       │
//!                    ▼                       ▼
//!                metadata             content + toc
//! ```
//!
//! The page template receives `config` (the whole config file), `content`,
//! `metadata`, `page_title` and `toc`. Autoescaping is off: `content` is HTML.
//! Undefined lookups such as a missing `metadata.author` render as empty.

use super::{Converter, FailurePolicy};
use crate::{
    config::{SiteConfig, SourceFormat},
    utils::minify::minify_html,
};
use anyhow::{Context, Result, bail};
use minijinja::{AutoEscape, Environment, UndefinedBehavior, context};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    fmt::Write as _,
    fs,
    path::Path,
};
use syntect::{
    highlighting::{Theme, ThemeSet},
    html::highlighted_html_for_string,
    parsing::SyntaxSet,
};

/// Frontmatter fence, alone on its line.
const FENCE: &str = "---";

/// Paragraph replaced by the table of contents.
const TOC_MARKER: &str = "[TOC]";

/// Frontmatter key/value pairs.
pub type Metadata = BTreeMap<String, serde_yaml::Value>;

/// One heading of a page, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub text: String,
}

// ============================================================================
// Converter
// ============================================================================

/// Renders markdown documents through the configured page template.
pub struct MarkdownConverter<'a> {
    config: &'a SiteConfig,
    env: Environment<'static>,
    highlighter: Highlighter,
}

impl<'a> MarkdownConverter<'a> {
    /// Set up the template environment and the highlight theme.
    ///
    /// Fails when the page template is missing or does not parse, before any
    /// document is read.
    pub fn new(config: &'a SiteConfig) -> Result<Self> {
        let env = template_env(&config.build.templates);
        let template = &config.build.template;
        env.get_template(template).with_context(|| {
            format!(
                "Template `{}` not found in {}",
                template,
                config.build.templates.display()
            )
        })?;

        Ok(Self {
            config,
            env,
            highlighter: Highlighter::new(&config.build.highlight_theme)?,
        })
    }

    /// Render the markdown body to HTML, collecting the table of contents.
    fn render_markdown(&self, body: &str) -> (String, Vec<TocEntry>) {
        let mut parser = Parser::new_ext(body, markdown_options());
        let mut events = Vec::new();
        let mut toc = Vec::new();
        let mut slugs = SlugSet::default();
        let mut toc_markers = Vec::new();

        while let Some(event) = parser.next() {
            match event {
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }) => {
                    let inner = take_until(&mut parser, |e| matches!(e, Event::End(TagEnd::Heading(_))));
                    let text = plain_text(&inner);
                    let id = slugs.unique(id.map_or_else(|| slugify(&text), |id| id.to_string()));

                    toc.push(TocEntry {
                        level: level as u8,
                        id: id.clone(),
                        text,
                    });
                    events.push(Event::Start(Tag::Heading {
                        level,
                        id: Some(id.into()),
                        classes,
                        attrs,
                    }));
                    events.extend(inner);
                    events.push(Event::End(TagEnd::Heading(level)));
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    let inner = take_until(&mut parser, |e| matches!(e, Event::End(TagEnd::CodeBlock)));
                    let code = plain_text(&inner);
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().map(str::to_owned)
                        }
                        CodeBlockKind::Indented => None,
                    };
                    let highlighted = self.highlighter.highlight(&code, lang.as_deref());
                    events.push(Event::Html(highlighted.into()));
                }

                Event::Start(Tag::Paragraph) => {
                    let inner = take_until(&mut parser, |e| matches!(e, Event::End(TagEnd::Paragraph)));
                    if is_toc_marker(&inner) {
                        toc_markers.push(events.len());
                        events.push(Event::Html(CowStr::Borrowed("")));
                    } else {
                        events.push(Event::Start(Tag::Paragraph));
                        events.extend(inner);
                        events.push(Event::End(TagEnd::Paragraph));
                    }
                }

                other => events.push(other),
            }
        }

        if !toc_markers.is_empty() {
            let toc_html = toc_to_html(&toc);
            for index in toc_markers {
                events[index] = Event::Html(toc_html.clone().into());
            }
        }

        let mut out = String::with_capacity(body.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        (out, toc)
    }
}

impl Converter for MarkdownConverter<'_> {
    fn format(&self) -> SourceFormat {
        SourceFormat::Markdown
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Soft
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        let text = fs::read_to_string(source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        let (metadata, body) = parse_frontmatter(&text)?;
        let (content, toc) = self.render_markdown(body);

        let title = page_title(&metadata, source);

        let template = &self.config.build.template;
        let html = self
            .env
            .get_template(template)
            .and_then(|page| {
                page.render(context! {
                    config => &self.config.site,
                    content => content,
                    metadata => metadata,
                    page_title => title,
                    toc => toc,
                })
            })
            .with_context(|| format!("Failed to render `{template}`"))?;
        let html = minify_html(html.as_bytes(), self.config);

        fs::write(target, html).with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(())
    }
}

/// Templates are loaded from `dir` on first use, by relative path.
fn template_env(dir: &Path) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(minijinja::path_loader(dir));
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options.insert(Options::ENABLE_DEFINITION_LIST);
    options
}

// ============================================================================
// Frontmatter
// ============================================================================

/// Split a leading `---` fenced block from the body.
///
/// Both fences must sit alone on their line. Returns `None` when the
/// document has no frontmatter.
fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text.strip_prefix(FENCE)?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse the frontmatter mapping and return it with the remaining body.
fn parse_frontmatter(text: &str) -> Result<(Metadata, &str)> {
    let Some((yaml, body)) = split_frontmatter(text) else {
        return Ok((Metadata::new(), text));
    };

    if yaml.trim().is_empty() {
        return Ok((Metadata::new(), body));
    }

    let metadata = serde_yaml::from_str(yaml).context("Invalid frontmatter")?;
    Ok((metadata, body))
}

/// Explicit `title` from frontmatter, else the file stem.
fn page_title(metadata: &Metadata, source: &Path) -> String {
    match metadata.get("title") {
        Some(serde_yaml::Value::String(title)) => title.clone(),
        Some(serde_yaml::Value::Number(n)) => n.to_string(),
        Some(serde_yaml::Value::Bool(b)) => b.to_string(),
        _ => source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

// ============================================================================
// Event Helpers
// ============================================================================

/// Consume events up to and including the first one matching `is_end`,
/// returning the events before it.
fn take_until<'a>(
    parser: &mut impl Iterator<Item = Event<'a>>,
    is_end: impl Fn(&Event<'a>) -> bool,
) -> Vec<Event<'a>> {
    parser.take_while(|e| !is_end(e)).collect()
}

/// Concatenated text of a run of events.
fn plain_text(events: &[Event<'_>]) -> String {
    events.iter().fold(String::new(), |mut acc, event| {
        if let Event::Text(text) | Event::Code(text) = event {
            acc.push_str(text);
        }
        acc
    })
}

/// A paragraph holding nothing but `[TOC]`.
fn is_toc_marker(events: &[Event<'_>]) -> bool {
    events.iter().all(|e| matches!(e, Event::Text(_))) && plain_text(events).trim() == TOC_MARKER
}

fn toc_to_html(entries: &[TocEntry]) -> String {
    let mut html = String::from("<div class=\"toc\">\n");
    let mut open_levels: Vec<u8> = Vec::new();

    for entry in entries {
        while open_levels.last().is_some_and(|&level| level > entry.level) {
            html.push_str("</li>\n</ul>\n");
            open_levels.pop();
        }
        if open_levels.last() == Some(&entry.level) {
            html.push_str("</li>\n");
        } else {
            html.push_str("<ul>\n");
            open_levels.push(entry.level);
        }
        let _ = write!(
            html,
            "<li><a href=\"#{}\">{}</a>",
            html_escape(&entry.id),
            html_escape(&entry.text)
        );
    }

    for _ in open_levels {
        html.push_str("</li>\n</ul>\n");
    }
    html.push_str("</div>\n");
    html
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// Heading Ids
// ============================================================================

/// Convert text to a URL-safe slug.
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c.is_whitespace() || c == '-' || c == '_' {
                Some('-')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Ids already handed out on the current page.
#[derive(Default)]
struct SlugSet(HashSet<String>);

impl SlugSet {
    /// Claim `base`, or `base-N` with the smallest free N.
    fn unique(&mut self, base: String) -> String {
        let base = if base.is_empty() {
            "section".to_owned()
        } else {
            base
        };

        let mut candidate = base.clone();
        let mut n = 1;
        while !self.0.insert(candidate.clone()) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        candidate
    }
}

// ============================================================================
// Syntax Highlighting
// ============================================================================

/// syntect highlighter with inline styles.
struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    fn new(theme_name: &str) -> Result<Self> {
        let mut themes = ThemeSet::load_defaults();
        let Some(theme) = themes.themes.remove(theme_name) else {
            let available: Vec<_> = themes.themes.keys().map(String::as_str).collect();
            bail!(
                "Unknown highlight theme `{theme_name}`, available: {}",
                available.join(", ")
            );
        };

        Ok(Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            theme,
        })
    }

    /// Highlight `code`, falling back to an escaped block for unknown languages.
    fn highlight(&self, code: &str, lang: Option<&str>) -> String {
        let highlighted = lang
            .and_then(|token| self.syntaxes.find_syntax_by_token(token))
            .and_then(|syntax| {
                highlighted_html_for_string(code, &self.syntaxes, syntax, &self.theme).ok()
            });

        highlighted.unwrap_or_else(|| match lang {
            Some(lang) => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>\n",
                html_escape(lang),
                html_escape(code)
            ),
            None => format!("<pre><code>{}</code></pre>\n", html_escape(code)),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
