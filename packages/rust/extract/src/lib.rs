//! Content extraction: turns an [`ArtifactInput`] into plain text.
//!
//! This crate provides:
//! - [`ExtractionRouter`]: dispatches on artifact kind, URL shape, and file signature
//! - [`ContentExtractor`]: the seam the pipeline calls through
//! - [`payload`]: base64 vs. literal-text detection for file payloads
//! - [`formats`]: PDF, DOCX, and plain-text file readers
//! - [`web`] / [`video`]: page text and video metadata extraction
//! - [`download`]: bounded fetch of remote documents

pub mod download;
pub mod formats;
pub mod payload;
pub mod video;
pub mod web;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument};

use triage_shared::{ArtifactInput, ArtifactKind, ExtractionConfig, Payload, Result, TriageError};

pub use download::{DownloadedDocument, Downloader};
pub use formats::FileFormat;

/// Maximum number of redirects followed on page fetches.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Anything that can produce plain text for an artifact.
///
/// Every failure is reported as [`TriageError::Extraction`].
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, input: &ArtifactInput) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Routes each artifact to the right extraction backend.
pub struct ExtractionRouter {
    client: Client,
    config: ExtractionConfig,
}

impl ExtractionRouter {
    /// Create a router with its own HTTP client.
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TriageError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn extract_url(&self, url: &str) -> Result<String> {
        if video::is_video_url(url) {
            debug!(%url, "video host detected, using metadata extraction");
            video::fetch_video_metadata(&self.client, url, &self.config.video_watch_url).await
        } else {
            web::fetch_page_text(&self.client, url, self.config.min_content_chars).await
        }
    }
}

#[async_trait]
impl ContentExtractor for ExtractionRouter {
    #[instrument(skip_all, fields(kind = %input.kind, source = %input.source))]
    async fn extract(&self, input: &ArtifactInput) -> Result<String> {
        let text = match input.kind {
            ArtifactKind::File => {
                let payload = input.payload.as_ref().ok_or_else(|| {
                    TriageError::extraction("file data is required for file extraction")
                })?;
                let bytes = payload::decode(payload)?;
                formats::extract_file(&input.source, &bytes)?
            }
            ArtifactKind::Url => {
                let url = match &input.payload {
                    Some(Payload::Text(url)) if input.source.trim().is_empty() => url.trim(),
                    _ => input.source.trim(),
                };
                self.extract_url(url).await?
            }
            ArtifactKind::Text => passthrough_text(input),
        };

        info!(chars = text.chars().count(), "content extracted");
        Ok(text)
    }
}

/// Text inputs are their own content; an absent or empty payload falls back to `source`.
fn passthrough_text(input: &ArtifactInput) -> String {
    match &input.payload {
        Some(Payload::Text(body)) if !body.is_empty() => body.clone(),
        Some(Payload::Bytes(bytes)) if !bytes.is_empty() => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        _ => input.source.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ExtractionRouter {
        ExtractionRouter::new(ExtractionConfig::default()).expect("build router")
    }

    #[tokio::test]
    async fn text_passthrough() {
        let input = ArtifactInput::text("note", "Some pasted text");
        assert_eq!(router().extract(&input).await.unwrap(), "Some pasted text");
    }

    #[tokio::test]
    async fn text_without_payload_uses_source() {
        let input = ArtifactInput {
            kind: ArtifactKind::Text,
            source: "the source is the content".into(),
            payload: None,
        };
        assert_eq!(
            router().extract(&input).await.unwrap(),
            "the source is the content"
        );
    }

    #[tokio::test]
    async fn file_with_literal_text_payload() {
        let input = ArtifactInput::file_encoded("notes.txt", "Hello world");
        assert_eq!(router().extract(&input).await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn file_with_base64_payload() {
        // "Hello, triage!" in base64
        let input = ArtifactInput::file_encoded("notes.txt", "SGVsbG8sIHRyaWFnZSE=");
        assert_eq!(router().extract(&input).await.unwrap(), "Hello, triage!");
    }

    #[tokio::test]
    async fn file_without_payload_fails() {
        let input = ArtifactInput {
            kind: ArtifactKind::File,
            source: "missing.pdf".into(),
            payload: None,
        };
        let err = router().extract(&input).await.unwrap_err();
        assert!(matches!(err, TriageError::Extraction { .. }));
    }

    #[tokio::test]
    async fn file_with_empty_bytes_fails() {
        let input = ArtifactInput::file("empty.txt", Vec::new());
        let err = router().extract(&input).await.unwrap_err();
        assert!(matches!(err, TriageError::Extraction { .. }));
    }

    #[tokio::test]
    async fn unreachable_url_is_extraction_error() {
        let config = ExtractionConfig {
            timeout_secs: 2,
            ..Default::default()
        };
        let router = ExtractionRouter::new(config).unwrap();
        let input = ArtifactInput::url("http://127.0.0.1:9/nothing-listens-here");
        let err = router.extract(&input).await.unwrap_err();
        assert!(matches!(err, TriageError::Extraction { .. }));
    }

    #[tokio::test]
    async fn url_routes_to_web_extraction() {
        let server = wiremock::MockServer::start().await;
        let body = format!(
            "<html><body><nav>Menu</nav><article>{}</article></body></html>",
            "Long form article text. ".repeat(10)
        );
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/post"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let input = ArtifactInput::url(format!("{}/post", server.uri()));
        let text = router().extract(&input).await.unwrap();
        assert!(text.starts_with("Long form article text."));
        assert!(!text.contains("Menu"));
    }
}
