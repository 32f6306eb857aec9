//! Bounded download of remote documents.
//!
//! Used when a URL handed in from outside points straight at a document: the
//! bytes are fetched here and then extracted as a file.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument};
use url::Url;

use triage_shared::{DeliveryConfig, Result, TriageError};

/// Fallback filename when the URL path has no usable last segment.
const DEFAULT_FILENAME: &str = "download";

/// A fetched document, ready to become a file artifact.
#[derive(Debug, Clone)]
pub struct DownloadedDocument {
    /// Last path segment of the URL, with `.pdf` added for extensionless PDFs.
    pub filename: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// HTTP downloader with a timeout and a response-size cap.
pub struct Downloader {
    client: Client,
    max_bytes: u64,
}

impl Downloader {
    pub fn new(config: &DeliveryConfig, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TriageError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_bytes: config.max_download_bytes,
        })
    }

    /// Fetch `url`, failing once the body exceeds the configured cap.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn download(&self, url: &Url) -> Result<DownloadedDocument> {
        let mut resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TriageError::Network(format!("download failed: {e}")))?;

        if let Some(len) = resp.content_length() {
            if len > self.max_bytes {
                return Err(TriageError::validation(format!(
                    "document is {len} bytes, over the {} byte limit",
                    self.max_bytes
                )));
            }
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| TriageError::Network(format!("download interrupted: {e}")))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(TriageError::validation(format!(
                    "document exceeds the {} byte limit",
                    self.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        let filename = filename_for(url, content_type.as_deref());
        info!(%filename, bytes = bytes.len(), "document downloaded");
        Ok(DownloadedDocument {
            filename,
            bytes,
            content_type,
        })
    }
}

fn filename_for(url: &Url, content_type: Option<&str>) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .unwrap_or(DEFAULT_FILENAME)
        .to_string();

    let is_pdf = content_type.is_some_and(|ct| ct.starts_with("application/pdf"));
    if is_pdf && !segment.to_ascii_lowercase().ends_with(".pdf") {
        debug!(%segment, "adding .pdf extension from content type");
        return format!("{segment}.pdf");
    }
    segment
}
