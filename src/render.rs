//! Content rendering for viewable files.
//!
//! Markdown is rendered with tables, fenced code, a generated table of
//! contents, a leading metadata block and soft-break-as-hard-break enabled;
//! rendered links whose target ends in `.md` are then rewritten into internal
//! viewer links, with relative targets resolved against the directory of the
//! source file. Every other viewable extension is HTML-escaped and wrapped as
//! a labeled code block.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use pulldown_cmark::{
    html, CowStr, Event, HeadingLevel, MetadataBlockKind, Options, Parser, Tag, TagEnd,
};
use regex::{Captures, Regex};

use crate::listing::lang_for;
use crate::paths::lexical_absolute;

#[derive(Debug, Clone)]
pub struct Rendered {
    pub html: String,
    pub toc: String,
    pub meta: BTreeMap<String, String>,
}

/// Render Markdown to HTML. `source` is the canonical path of the file being
/// viewed; it anchors relative link targets.
pub fn render_markdown(content: &str, source: &Path) -> Rendered {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);

    let events: Vec<Event> = Parser::new_ext(content, options).collect();

    let mut meta: BTreeMap<String, String> = BTreeMap::new();
    let mut toc_entries: Vec<TocEntry> = Vec::new();
    let mut slug_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut out: Vec<Event> = Vec::with_capacity(events.len());

    let mut i = 0;
    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::MetadataBlock(MetadataBlockKind::YamlStyle)) => {
                i += 1;
                while i < events.len() {
                    match &events[i] {
                        Event::Text(t) => parse_meta_block(t, &mut meta),
                        Event::End(TagEnd::MetadataBlock(_)) => break,
                        _ => {}
                    }
                    i += 1;
                }
            }
            Event::Start(Tag::Heading { level, .. }) => {
                let level = *level;
                let text = heading_text(&events[i + 1..]);
                let slug = unique_slug(&text, &mut slug_counts);
                toc_entries.push(TocEntry {
                    rank: heading_rank(level),
                    slug: slug.clone(),
                    text,
                });
                out.push(Event::Start(Tag::Heading {
                    level,
                    id: Some(CowStr::from(slug)),
                    classes: Vec::new(),
                    attrs: Vec::new(),
                }));
            }
            Event::SoftBreak => out.push(Event::HardBreak),
            ev => out.push(ev.clone()),
        }
        i += 1;
    }

    let mut html_out = String::new();
    html::push_html(&mut html_out, out.into_iter());
    let html_out = convert_internal_links(&html_out, source);

    Rendered {
        html: html_out,
        toc: build_toc(&toc_entries),
        meta,
    }
}

/// Wrap escaped text as a labeled code block; the label comes from the static
/// extension table, defaulting to plain text.
pub fn render_code(content: &str, ext: &str) -> String {
    format!(
        "<pre><code class=\"language-{}\">{}</code></pre>",
        lang_for(ext),
        escape_html(content)
    )
}

static MD_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a href="([^"]+\.md)"[^>]*>([^<]+)</a>"#).unwrap());

/// Rewrite rendered `.md` hyperlinks into internal viewer links. Relative
/// targets are resolved against the source file's directory; absolute targets
/// pass through unchanged.
pub fn convert_internal_links(html: &str, source: &Path) -> String {
    let dir = source.parent().unwrap_or_else(|| Path::new("/"));
    MD_LINK_RE
        .replace_all(html, |caps: &Captures| {
            let href = &caps[1];
            let text = &caps[2];
            let target = if href.starts_with('/') {
                href.to_string()
            } else {
                lexical_absolute(&dir.join(href))
                    .to_string_lossy()
                    .into_owned()
            };
            format!("<a href=\"?file={target}\">{text}</a>")
        })
        .into_owned()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone)]
struct TocEntry {
    rank: u32,
    slug: String,
    text: String,
}

fn heading_rank(level: HeadingLevel) -> u32 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Collect the plain text between a heading start and its end tag.
fn heading_text(rest: &[Event]) -> String {
    let mut text = String::new();
    for ev in rest {
        match ev {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::End(TagEnd::Heading(_)) => break,
            _ => {}
        }
    }
    text
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn unique_slug(text: &str, counts: &mut BTreeMap<String, usize>) -> String {
    let base = slugify(text);
    let n = counts.entry(base.clone()).or_insert(0);
    let slug = if *n == 0 { base.clone() } else { format!("{base}-{n}") };
    *n += 1;
    slug
}

/// Nested `<ul>` table of contents; empty string when there are no headings.
fn build_toc(entries: &[TocEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut out = String::from("<div class=\"toc\"><ul>");
    let mut stack: Vec<u32> = Vec::new();
    let mut open_item = false;
    for e in entries {
        let rank = e.rank;
        if let Some(&top) = stack.last() {
            if rank > top {
                out.push_str("<ul>");
                stack.push(rank);
                open_item = false;
            } else {
                while stack.len() > 1 && *stack.last().unwrap() > rank {
                    if open_item {
                        out.push_str("</li>");
                    }
                    out.push_str("</ul></li>");
                    stack.pop();
                    open_item = false;
                }
                if open_item {
                    out.push_str("</li>");
                    open_item = false;
                }
            }
        } else {
            stack.push(rank);
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            e.slug,
            escape_html(&e.text)
        ));
        open_item = true;
    }
    while stack.len() > 1 {
        out.push_str("</li></ul>");
        stack.pop();
        open_item = true;
    }
    if open_item {
        out.push_str("</li>");
    }
    out.push_str("</ul></div>");
    out
}

/// Parse `key: value` lines from the leading metadata block; keys are
/// lowercased.
fn parse_meta_block(raw: &str, meta: &mut BTreeMap<String, String>) {
    for line in raw.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase();
            if !key.is_empty() {
                meta.insert(key, value.trim().to_string());
            }
        }
    }
}
