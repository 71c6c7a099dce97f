//! Extraction collaborator: pure HTML-to-structure function.
//!
//! Parses the fetched document and summarizes title, links, relevant meta
//! tags, heading structure, and image count. No I/O, no suspension; the
//! caller runs it inline while holding its admission slot.

use std::collections::BTreeMap;

use pagelens_core::messages::PageSummary;
use scraper::{Html, Selector};

/// Summarizes an HTML document.
///
/// Tolerant of malformed markup: the parser recovers what it can and the
/// summary reflects whatever was recognizable.
#[must_use]
pub fn extract(html: &str) -> PageSummary {
    let doc = Html::parse_document(html);

    let title = select_first_text(&doc, "title");

    let links = selector("a[href]").map_or_else(Vec::new, |sel| {
        doc.select(&sel)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .collect()
    });

    let images_count = selector("img").map_or(0, |sel| doc.select(&sel).count());

    let mut structure = BTreeMap::new();
    for level in 1..=6 {
        let tag = format!("h{level}");
        let count = selector(&tag).map_or(0, |sel| doc.select(&sel).count());
        structure.insert(tag, count);
    }

    PageSummary {
        title,
        links,
        meta_tags: extract_meta_tags(&doc),
        structure,
        images_count,
    }
}

/// Collects the relevant meta tags: `description`, `keywords`, and any
/// Open Graph (`og:*`) tag, keyed by `name` (or `property`).
fn extract_meta_tags(doc: &Html) -> BTreeMap<String, String> {
    let mut meta_tags = BTreeMap::new();

    let Some(sel) = selector("meta") else {
        return meta_tags;
    };

    for meta in doc.select(&sel) {
        let element = meta.value();
        let Some(name) = element.attr("name").or_else(|| element.attr("property")) else {
            continue;
        };
        let Some(content) = element.attr("content") else {
            continue;
        };

        let lowered = name.to_lowercase();
        if lowered == "description" || lowered == "keywords" || lowered.starts_with("og:") {
            meta_tags.insert(name.to_string(), content.to_string());
        }
    }

    meta_tags
}

fn select_first_text(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}
