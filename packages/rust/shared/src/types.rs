//! Core domain types for artifacts and their verdicts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TriageError};

/// Appended to model input that was cut to fit the token ceiling.
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated due to length...]";

// ---------------------------------------------------------------------------
// ArtifactId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for artifact identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    /// Generate a new time-sortable artifact identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| TriageError::validation(format!("invalid artifact id {s:?}: {e}")))
    }
}

// ---------------------------------------------------------------------------
// ArtifactInput
// ---------------------------------------------------------------------------

/// What kind of thing was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    File,
    Url,
    Text,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Url => "url",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(Self::File),
            "url" => Ok(Self::Url),
            "text" => Ok(Self::Text),
            other => Err(TriageError::validation(format!(
                "unsupported artifact kind: {other}"
            ))),
        }
    }
}

/// Raw content accompanying an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Binary file content.
    Bytes(Vec<u8>),
    /// A string: literal text, or base64-encoded file bytes.
    Text(String),
}

/// One unit of content submitted for analysis.
///
/// `File` inputs need a non-empty payload. `Url` and `Text` inputs fall back
/// to `source` as their content when the payload is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInput {
    pub kind: ArtifactKind,
    /// Filename, URL, or a label for pasted text.
    pub source: String,
    pub payload: Option<Payload>,
}

impl ArtifactInput {
    /// A file given as raw bytes.
    pub fn file(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            kind: ArtifactKind::File,
            source: filename.into(),
            payload: Some(Payload::Bytes(bytes)),
        }
    }

    /// A file given in its string wire form (base64 or literal text).
    pub fn file_encoded(filename: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::File,
            source: filename.into(),
            payload: Some(Payload::Text(data.into())),
        }
    }

    /// A web page or video URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Url,
            source: url.into(),
            payload: None,
        }
    }

    /// Literal text with a label.
    pub fn text(label: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Text,
            source: label.into(),
            payload: Some(Payload::Text(body.into())),
        }
    }

    /// Best available stand-in for content when extraction fails: the literal
    /// text for text inputs, otherwise the source identifier.
    pub fn raw_representation(&self) -> String {
        match (&self.kind, &self.payload) {
            (ArtifactKind::Text, Some(Payload::Text(body))) => body.clone(),
            _ => self.source.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Verdict / result
// ---------------------------------------------------------------------------

/// Keep/discard decision. `Error` marks a run that could not be analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Read,
    Discard,
    Error,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Discard => "Discard",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recommendation {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Read" => Ok(Self::Read),
            "Discard" => Ok(Self::Discard),
            "Error" => Ok(Self::Error),
            other => Err(TriageError::validation(format!(
                "unknown recommendation: {other}"
            ))),
        }
    }
}

/// Flat outcome of one processing run, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Full, untruncated extracted text (or the raw input on extraction failure).
    pub extracted_content: String,
    pub recommendation: Recommendation,
    pub summary: String,
    pub rationale: String,
    /// Provider that answered; `None` when no model reply was obtained.
    pub provider_id: Option<String>,
    pub model_id: Option<String>,
    /// Whether the text sent to the model was truncated.
    pub was_truncated: bool,
}

/// A persisted artifact: identity plus the latest processing result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub source: String,
    #[serde(flatten)]
    pub result: ProcessingResult,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Wrap a fresh result in a new record.
    pub fn new(kind: ArtifactKind, source: impl Into<String>, result: ProcessingResult) -> Self {
        let now = Utc::now();
        Self {
            id: ArtifactId::new(),
            kind,
            source: source.into(),
            result,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_id_roundtrip() {
        let id = ArtifactId::new();
        let parsed: ArtifactId = id.to_string().parse().expect("parse id");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ArtifactId>().is_err());
    }

    #[test]
    fn raw_representation_prefers_literal_text() {
        let text = ArtifactInput::text("note", "remember the milk");
        assert_eq!(text.raw_representation(), "remember the milk");

        let url = ArtifactInput::url("https://example.com/post");
        assert_eq!(url.raw_representation(), "https://example.com/post");

        let file = ArtifactInput::file("report.pdf", vec![1, 2, 3]);
        assert_eq!(file.raw_representation(), "report.pdf");
    }

    #[test]
    fn kind_and_recommendation_parse() {
        assert_eq!("url".parse::<ArtifactKind>().unwrap(), ArtifactKind::Url);
        assert!("folder".parse::<ArtifactKind>().is_err());
        assert_eq!(
            "Discard".parse::<Recommendation>().unwrap(),
            Recommendation::Discard
        );
        assert_eq!(Recommendation::Error.to_string(), "Error");
    }

    #[test]
    fn record_serializes_flat() {
        let record = ArtifactRecord::new(
            ArtifactKind::Text,
            "note",
            ProcessingResult {
                extracted_content: "hi".into(),
                recommendation: Recommendation::Read,
                summary: "s".into(),
                rationale: "r".into(),
                provider_id: Some("openai".into()),
                model_id: Some("gpt-4".into()),
                was_truncated: false,
            },
        );
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["recommendation"], "Read");
        assert_eq!(json["kind"], "text");
        assert_eq!(json["extracted_content"], "hi");
    }
}
