//! Routing for URLs handed in from outside the application.
//!
//! Links that point straight at a document are fetched and processed as files;
//! everything else is processed as a web page.

use tracing::{debug, info, instrument, warn};
use url::Url;

use triage_extract::Downloader;
use triage_shared::{ArtifactInput, Result, TriageError};

/// Path extensions treated as direct document links.
const DOCUMENT_EXTENSIONS: [&str; 4] = ["pdf", "docx", "txt", "md"];

/// Path segments that mark a document link regardless of extension (arXiv `/pdf/<id>`).
const DOCUMENT_SEGMENTS: [&str; 1] = ["pdf"];

/// Whether `url` looks like a downloadable document rather than a page.
pub fn is_document_url(url: &Url) -> bool {
    let Some(segments) = url.path_segments() else {
        return false;
    };
    let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();

    let by_extension = segments
        .last()
        .and_then(|last| last.rsplit_once('.'))
        .is_some_and(|(_, ext)| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });

    // A pattern segment only counts when something follows it.
    let by_pattern = segments.len() > 1
        && segments[..segments.len() - 1]
            .iter()
            .any(|s| DOCUMENT_SEGMENTS.contains(&s.to_ascii_lowercase().as_str()));

    by_extension || by_pattern
}

/// Turn an externally delivered URL into a correctly typed [`ArtifactInput`].
///
/// Document links are downloaded and become `File` inputs. A failed download
/// falls back to the `Url` form. Only an unparseable URL is an error.
#[instrument(skip_all, fields(url = %raw))]
pub async fn resolve(raw: &str, downloader: &Downloader) -> Result<ArtifactInput> {
    let url = Url::parse(raw.trim())
        .map_err(|e| TriageError::validation(format!("invalid URL '{raw}': {e}")))?;

    if !is_document_url(&url) {
        debug!("routing as web page");
        return Ok(ArtifactInput::url(url.as_str()));
    }

    match downloader.download(&url).await {
        Ok(doc) => {
            info!(filename = %doc.filename, bytes = doc.bytes.len(), "document downloaded");
            Ok(ArtifactInput::file(doc.filename, doc.bytes))
        }
        Err(e) => {
            warn!(error = %e, "document download failed, routing as web page");
            Ok(ArtifactInput::url(url.as_str()))
        }
    }
}
