//! Chapter partitioning: split one HTML document at `<h1>` boundaries.
//!
//! Every `<h1>` opens a chapter that runs to the next `<h1>` or the end of
//! the document. The heading's text (tags stripped, entities decoded)
//! becomes the chapter title; a URL-safe slug is derived from it. Chapters
//! are numbered from zero in document order, and position 0 is flagged as
//! the free preview.
//!
//! A manuscript with no `<h1>` at all still produces one chapter covering
//! the whole document, so downstream stages never have to handle an empty
//! chapter list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// One partitioned chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    /// Heading text with tags stripped and entities decoded.
    pub title: String,
    /// URL-safe identifier derived from the title.
    pub slug: String,
    /// The chapter's HTML, including its opening `<h1>`.
    pub content: String,
    /// Zero-based document-order index.
    pub position: usize,
    /// Whether this chapter is readable without purchase. Always and only
    /// the first chapter.
    pub is_free_preview: bool,
}

static RE_H1_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1(\s[^>]*)?>").unwrap());
static RE_H1: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h1(?:\s[^>]*)?>(.*?)</h1>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Split `html` into chapters at `<h1>` boundaries.
///
/// Content before the first `<h1>` (a pandoc title block, a stray preamble
/// paragraph) belongs to no chapter and is dropped. When the document has
/// no `<h1>` the whole input becomes a single chapter titled "Chapter 1".
pub fn partition(html: &str) -> Vec<Chapter> {
    let starts: Vec<usize> = RE_H1_OPEN.find_iter(html).map(|m| m.start()).collect();

    if starts.is_empty() {
        return vec![Chapter {
            title: "Chapter 1".to_string(),
            slug: "chapter-1".to_string(),
            content: html.to_string(),
            position: 0,
            is_free_preview: true,
        }];
    }

    starts
        .iter()
        .enumerate()
        .map(|(position, &start)| {
            let end = starts.get(position + 1).copied().unwrap_or(html.len());
            let content = &html[start..end];

            let title = RE_H1
                .captures(content)
                .map(|c| heading_text(&c[1]))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Chapter {}", position + 1));

            let mut slug = slugify(&title);
            if slug.is_empty() {
                slug = format!("chapter-{}", position + 1);
            }

            Chapter {
                title,
                slug,
                content: content.to_string(),
                position,
                is_free_preview: position == 0,
            }
        })
        .collect()
}

/// Plain text of a heading: inner tags stripped, entities decoded,
/// whitespace collapsed.
fn heading_text(inner: &str) -> String {
    let stripped = RE_TAG.replace_all(inner, "");
    let decoded = stripped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive a URL-safe slug: lowercase, runs of non-alphanumerics collapsed
/// to single hyphens, no leading or trailing hyphen.
///
/// Idempotent: `slugify(slugify(s)) == slugify(s)`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_every_h1() {
        let html = "<h1>One</h1><p>a</p><h1>Two</h1><p>b</p><h1>Three</h1><p>c</p>";
        let chapters = partition(html);
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "One");
        assert_eq!(chapters[1].title, "Two");
        assert_eq!(chapters[2].title, "Three");
    }

    #[test]
    fn chapter_content_covers_heading_through_next_boundary() {
        let html = "<h1>One</h1><p>a</p><h1>Two</h1><p>b</p>";
        let chapters = partition(html);
        assert_eq!(chapters[0].content, "<h1>One</h1><p>a</p>");
        assert_eq!(chapters[1].content, "<h1>Two</h1><p>b</p>");
    }

    #[test]
    fn positions_are_sequential_and_first_is_free() {
        let html = "<h1>A</h1><h1>B</h1><h1>C</h1>";
        let chapters = partition(html);
        for (i, ch) in chapters.iter().enumerate() {
            assert_eq!(ch.position, i);
            assert_eq!(ch.is_free_preview, i == 0);
        }
    }

    #[test]
    fn preamble_before_first_h1_is_dropped() {
        let html = "<p>front matter</p><h1>One</h1><p>a</p>";
        let chapters = partition(html);
        assert_eq!(chapters.len(), 1);
        assert!(!chapters[0].content.contains("front matter"));
        assert!(chapters[0].content.starts_with("<h1>"));
    }

    #[test]
    fn no_heading_falls_back_to_single_chapter() {
        let html = "<p>just paragraphs</p><p>nothing else</p>";
        let chapters = partition(html);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Chapter 1");
        assert_eq!(chapters[0].slug, "chapter-1");
        assert_eq!(chapters[0].position, 0);
        assert!(chapters[0].is_free_preview);
        assert_eq!(chapters[0].content, html);
    }

    #[test]
    fn heading_with_attributes_and_inner_markup() {
        let html = r#"<h1 id="intro" class="x">The <em>Very</em> Beginning</h1><p>a</p>"#;
        let chapters = partition(html);
        assert_eq!(chapters[0].title, "The Very Beginning");
        assert_eq!(chapters[0].slug, "the-very-beginning");
    }

    #[test]
    fn heading_entities_are_decoded() {
        let html = "<h1>Salt &amp; Stone</h1>";
        let chapters = partition(html);
        assert_eq!(chapters[0].title, "Salt & Stone");
        assert_eq!(chapters[0].slug, "salt-stone");
    }

    #[test]
    fn empty_or_symbol_only_heading_gets_ordinal_slug() {
        let html = "<h1>First</h1><h1>!!!</h1><h1></h1>";
        let chapters = partition(html);
        assert_eq!(chapters[0].slug, "first");
        // Symbol-only title survives as text but slugifies to nothing.
        assert_eq!(chapters[1].title, "!!!");
        assert_eq!(chapters[1].slug, "chapter-2");
        // Fully empty heading falls back for the title too.
        assert_eq!(chapters[2].title, "Chapter 3");
        assert_eq!(chapters[2].slug, "chapter-3");
    }

    #[test]
    fn slugify_collapses_symbol_runs_and_trims() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  --spaced--  "), "spaced");
        assert_eq!(slugify("Chapter 12: The End"), "chapter-12-the-end");
        assert_eq!(slugify("¡señor!"), "se-or");
    }

    #[test]
    fn slugify_is_idempotent() {
        for s in ["Hello, World!", "a  b", "already-a-slug", "123", "???"] {
            let once = slugify(s);
            assert_eq!(slugify(&once), once, "not idempotent for {s:?}");
        }
    }
}
