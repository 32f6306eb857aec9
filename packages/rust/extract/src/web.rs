//! Main-content text extraction from web pages.
//!
//! Page chrome (scripts, navigation, ads, sidebars) is ignored. The first
//! content region with enough text wins; otherwise the whole `<body>` is used.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use triage_shared::{Result, TriageError};

/// Elements whose text never counts as page content.
static STRIP: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("script, style, nav, footer, aside, .ad, .advertisement, .sidebar")
        .expect("valid selector")
});

/// Candidate content regions, most specific first.
static CONTENT_REGIONS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "article",
        r#"[role="main"]"#,
        "main",
        ".content",
        ".post-content",
        ".entry-content",
        ".article-body",
        "#content",
        ".main-content",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});

static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Fetch a page and return its main text.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_page_text(client: &Client, url: &str, min_chars: usize) -> Result<String> {
    let html = client
        .get(url)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| TriageError::extraction(format!("failed to extract web content: {e}")))?
        .text()
        .await
        .map_err(|e| TriageError::extraction(format!("failed to extract web content: {e}")))?;

    debug!(bytes = html.len(), "page fetched");
    Ok(page_text(&html, min_chars))
}

/// Main text of an HTML document, whitespace collapsed.
///
/// A selector's text is that of every element it matches, joined. It is used
/// only if longer than `min_chars`.
pub fn page_text(html: &str, min_chars: usize) -> String {
    let doc = Html::parse_document(html);

    for selector in CONTENT_REGIONS.iter() {
        let text = doc
            .select(selector)
            .map(clean_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.chars().count() > min_chars {
            debug!(?selector, chars = text.len(), "content region selected");
            return text;
        }
    }

    doc.select(&BODY).next().map(clean_text).unwrap_or_default()
}

/// Text under `root`, skipping stripped elements, with runs of whitespace
/// collapsed to one space.
fn clean_text(root: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let stripped = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| STRIP.matches(&el));
        if !stripped {
            raw.push_str(text);
        }
    }
    WHITESPACE_RE.replace_all(&raw, " ").trim().to_string()
}
