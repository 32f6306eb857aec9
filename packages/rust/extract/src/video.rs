//! Video page metadata extraction.
//!
//! Video URLs carry no readable body, so the title and description from the
//! watch page's OpenGraph tags stand in for the content.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use triage_shared::{Result, TriageError};

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([^&\n?#]+)").expect("valid regex")
});

static OG_TITLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector")
});

static OG_DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:description"]"#).expect("valid selector")
});

/// Whether the URL points at a video host (`youtube.com`, its subdomains, or `youtu.be`).
pub fn is_video_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    match parsed.host_str() {
        Some(host) => {
            host == "youtube.com" || host.ends_with(".youtube.com") || host == "youtu.be"
        }
        None => false,
    }
}

/// The video id from a watch or short-link URL.
pub fn video_id(url: &str) -> Option<&str> {
    VIDEO_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Fetch the watch page for `url` and render its metadata as text.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_video_metadata(client: &Client, url: &str, watch_url: &str) -> Result<String> {
    let id = video_id(url).ok_or_else(|| {
        TriageError::extraction("failed to extract video content: invalid video URL")
    })?;
    debug!(video_id = id, "fetching watch page");

    let html = client
        .get(watch_url)
        .query(&[("v", id)])
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| TriageError::extraction(format!("failed to extract video content: {e}")))?
        .text()
        .await
        .map_err(|e| TriageError::extraction(format!("failed to extract video content: {e}")))?;

    Ok(metadata_text(&html))
}

/// `YouTube Video: {title}\n\nDescription: {description}` from OpenGraph tags.
pub fn metadata_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let meta_content = |selector: &Selector| {
        doc.select(selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    };

    let title = meta_content(&OG_TITLE).unwrap_or_else(|| "Unknown Title".to_string());
    let description = meta_content(&OG_DESCRIPTION).unwrap_or_default();

    format!("YouTube Video: {title}\n\nDescription: {description}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn video_hosts_detected() {
        assert!(is_video_url("https://www.youtube.com/watch?v=abc"));
        assert!(is_video_url("https://youtube.com/watch?v=abc"));
        assert!(is_video_url("https://m.youtube.com/watch?v=abc"));
        assert!(is_video_url("https://youtu.be/abc"));
        assert!(!is_video_url("https://example.com/youtube.com/watch?v=abc"));
        assert!(!is_video_url("https://notyoutube.com/watch?v=abc"));
        assert!(!is_video_url("not a url"));
    }

    #[test]
    fn ids_from_both_url_shapes() {
        assert_eq!(video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"), Some("dQw4w9WgXcQ"));
        assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ?si=xyz"), Some("dQw4w9WgXcQ"));
        assert_eq!(video_id("https://www.youtube.com/channel/UC123"), None);
    }

    #[test]
    fn metadata_defaults() {
        let text = metadata_text("<html><head></head><body></body></html>");
        assert_eq!(text, "YouTube Video: Unknown Title\n\nDescription: ");
    }

    #[tokio::test]
    async fn fetches_watch_page_metadata() {
        let server = MockServer::start().await;
        let page = r#"<html><head>
            <meta property="og:title" content="Rust in 100 Seconds">
            <meta property="og:description" content="A quick tour of the language.">
            </head><body></body></html>"#;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .and(query_param("v", "5C_HPTJg5ek"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let text = fetch_video_metadata(
            &Client::new(),
            "https://youtu.be/5C_HPTJg5ek",
            &format!("{}/watch", server.uri()),
        )
        .await
        .unwrap();
        assert_eq!(
            text,
            "YouTube Video: Rust in 100 Seconds\n\nDescription: A quick tour of the language."
        );
    }

    #[tokio::test]
    async fn url_without_id_fails() {
        let err = fetch_video_metadata(
            &Client::new(),
            "https://www.youtube.com/feed/trending",
            "http://127.0.0.1:9/watch",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TriageError::Extraction { .. }));
    }
}
