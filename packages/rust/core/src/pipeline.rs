//! Processing orchestrator: extract → budget → invoke → normalize.
//!
//! [`Pipeline::process`] never returns an error. Any stage failure becomes a
//! `Recommendation::Error` result, and once text has been extracted it is
//! kept in the result whatever happens afterwards.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use triage_extract::{ContentExtractor, ExtractionRouter};
use triage_llm::{HttpGateway, ModelGateway};
use triage_shared::{
    AppConfig, ArtifactId, ArtifactInput, ArtifactRecord, PipelineConfig, ProcessingResult,
    Recommendation, Result, TriageError,
};
use triage_storage::Storage;

use crate::budget::{self, BudgetedText};
use crate::normalize::{self, NormalizedVerdict};

/// Summary for a run whose extraction failed.
pub const EXTRACTION_FAILED_SUMMARY: &str = "Content extraction failed";
/// Summary for a run whose model call failed on size.
pub const TOO_LARGE_SUMMARY: &str = "Content too large for AI analysis";
/// Summary for any other post-extraction failure.
pub const ANALYSIS_FAILED_SUMMARY: &str = "AI analysis failed";

const TOO_LARGE_RATIONALE: &str = "Document is too large for AI analysis (token limit exceeded). The extracted content is preserved below for manual review. Consider using a more powerful model or splitting the content into smaller sections.";

/// Words that mark a failure as a size/limit problem.
const SIZE_ERROR_KEYWORDS: [&str; 3] = ["token", "context", "length"];

// ---------------------------------------------------------------------------
// Configuration source
// ---------------------------------------------------------------------------

/// Where a run reads its configuration snapshot from.
///
/// Read once per run, after extraction succeeds.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn pipeline_config(&self) -> Result<PipelineConfig>;
}

#[async_trait]
impl ConfigSource for PipelineConfig {
    async fn pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(self.clone())
    }
}

#[async_trait]
impl ConfigSource for Storage {
    async fn pipeline_config(&self) -> Result<PipelineConfig> {
        self.load_pipeline_config().await
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Stages of one processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Budgeting,
    Invoking,
    Normalizing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extracting => "Extracting content",
            Self::Budgeting => "Fitting token budget",
            Self::Invoking => "Waiting for model",
            Self::Normalizing => "Reading verdict",
            Self::Done => "Done",
        })
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a stage.
    fn stage(&self, stage: Stage);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
}

// ---------------------------------------------------------------------------
// Internal outcome
// ---------------------------------------------------------------------------

/// Result of one run before it is flattened for storage.
#[derive(Debug)]
enum Outcome {
    Analyzed {
        content: String,
        verdict: NormalizedVerdict,
        provider_id: String,
        model_id: String,
        was_truncated: bool,
        ceiling: usize,
    },
    ExtractionFailed {
        raw: String,
        reason: String,
    },
    AnalysisFailed {
        content: String,
        reason: String,
        was_truncated: bool,
    },
}

impl Outcome {
    fn into_result(self) -> ProcessingResult {
        match self {
            Self::Analyzed {
                content,
                verdict,
                provider_id,
                model_id,
                was_truncated,
                ceiling,
            } => {
                let rationale = if was_truncated {
                    format!(
                        "Note: Content was truncated to fit token limits (analyzed first {} tokens). Full content is preserved below.\n\n{}",
                        budget::analyzed_tokens(ceiling),
                        verdict.rationale
                    )
                } else {
                    verdict.rationale
                };
                ProcessingResult {
                    extracted_content: content,
                    recommendation: verdict.recommendation,
                    summary: verdict.summary,
                    rationale,
                    provider_id: Some(provider_id),
                    model_id: Some(model_id),
                    was_truncated,
                }
            }
            Self::ExtractionFailed { raw, reason } => ProcessingResult {
                extracted_content: raw,
                recommendation: Recommendation::Error,
                summary: EXTRACTION_FAILED_SUMMARY.to_string(),
                rationale: format!("Content extraction failed: {reason}"),
                provider_id: None,
                model_id: None,
                was_truncated: false,
            },
            Self::AnalysisFailed {
                content,
                reason,
                was_truncated,
            } => {
                let (summary, rationale) = if is_size_error(&reason) {
                    (TOO_LARGE_SUMMARY.to_string(), TOO_LARGE_RATIONALE.to_string())
                } else {
                    (
                        ANALYSIS_FAILED_SUMMARY.to_string(),
                        format!(
                            "AI analysis failed: {reason}. The extracted content is preserved below for manual review."
                        ),
                    )
                };
                ProcessingResult {
                    extracted_content: content,
                    recommendation: Recommendation::Error,
                    summary,
                    rationale,
                    provider_id: None,
                    model_id: None,
                    was_truncated,
                }
            }
        }
    }
}

/// Whether a failure message points at the content being too large.
pub fn is_size_error(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    SIZE_ERROR_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Whether a stored result holds genuinely extracted text.
///
/// A failed extraction stores the raw input as a stand-in, which must never be
/// analyzed as if it were the document.
pub fn has_extracted_content(result: &ProcessingResult) -> bool {
    let extraction_failed = result.recommendation == Recommendation::Error
        && result.provider_id.is_none()
        && result.summary == EXTRACTION_FAILED_SUMMARY;
    !extraction_failed && !result.extracted_content.trim().is_empty()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Sequences the stages for one artifact at a time. Holds no mutable state.
pub struct Pipeline {
    extractor: Box<dyn ContentExtractor>,
    gateway: Box<dyn ModelGateway>,
    progress: Arc<dyn ProgressReporter>,
}

impl Pipeline {
    pub fn new(extractor: Box<dyn ContentExtractor>, gateway: Box<dyn ModelGateway>) -> Self {
        Self {
            extractor,
            gateway,
            progress: Arc::new(SilentProgress),
        }
    }

    /// Real HTTP extraction and model backends, configured from the app config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        let extractor = ExtractionRouter::new(config.extraction.clone())?;
        let gateway = HttpGateway::new(&config.gateway)?;
        Ok(Self::new(Box::new(extractor), Box::new(gateway)))
    }

    /// Report stage changes to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Process one artifact. Always yields a result; failures are data.
    #[instrument(skip_all, fields(kind = %input.kind, source = %input.source))]
    pub async fn process(&self, input: &ArtifactInput, config: &dyn ConfigSource) -> ProcessingResult {
        self.progress.stage(Stage::Extracting);
        let content = match self.extractor.extract(input).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "extraction failed");
                self.progress.stage(Stage::Done);
                return Outcome::ExtractionFailed {
                    raw: input.raw_representation(),
                    reason: e.reason(),
                }
                .into_result();
            }
        };

        let outcome = self.analyze(content, config).await;
        self.progress.stage(Stage::Done);
        outcome.into_result()
    }

    /// Process and insert a new record, reading configuration from `storage`.
    pub async fn process_and_store(
        &self,
        input: &ArtifactInput,
        storage: &Storage,
    ) -> Result<ArtifactRecord> {
        let result = self.process(input, storage).await;
        let record = ArtifactRecord::new(input.kind, input.source.clone(), result);
        storage.insert_artifact(&record).await?;
        info!(id = %record.id, recommendation = %record.result.recommendation, "artifact processed");
        Ok(record)
    }

    /// Re-run analysis on a stored artifact's extracted content with the
    /// current configuration, replacing only its model-derived fields.
    ///
    /// Fails for an unknown id, or when the record has no content to analyze.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn reprocess(&self, storage: &Storage, id: &ArtifactId) -> Result<ArtifactRecord> {
        let mut record = storage
            .get_artifact(id)
            .await?
            .ok_or_else(|| TriageError::NotFound(format!("artifact {id}")))?;

        if !has_extracted_content(&record.result) {
            return Err(TriageError::MissingContent(id.to_string()));
        }

        let content = std::mem::take(&mut record.result.extracted_content);
        let result = self.analyze(content, storage).await.into_result();
        self.progress.stage(Stage::Done);

        storage.update_verdict(id, &result).await?;
        info!(recommendation = %result.recommendation, "artifact reprocessed");

        let updated = storage
            .get_artifact(id)
            .await?
            .ok_or_else(|| TriageError::NotFound(format!("artifact {id}")))?;
        Ok(updated)
    }

    /// Budget, invoke, and normalize. `content` is returned in every outcome.
    async fn analyze(&self, content: String, config: &dyn ConfigSource) -> Outcome {
        let snapshot = match config.pipeline_config().await.and_then(|c| {
            c.validate()?;
            Ok(c)
        }) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "configuration unavailable, content preserved");
                return Outcome::AnalysisFailed {
                    content,
                    reason: e.reason(),
                    was_truncated: false,
                };
            }
        };

        self.progress.stage(Stage::Budgeting);
        let BudgetedText {
            text_for_model,
            was_truncated,
        } = budget::budget(&content, snapshot.token_ceiling);
        info!(
            estimated_tokens = budget::estimate_tokens(&content),
            ceiling = snapshot.token_ceiling,
            was_truncated,
            "content budgeted"
        );

        self.progress.stage(Stage::Invoking);
        let reply = match snapshot.active_settings() {
            Ok(settings) => {
                self.gateway
                    .invoke(
                        &snapshot.instruction_prompt,
                        &text_for_model,
                        snapshot.active_provider,
                        settings,
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "analysis failed, content preserved");
                return Outcome::AnalysisFailed {
                    content,
                    reason: e.reason(),
                    was_truncated,
                };
            }
        };

        self.progress.stage(Stage::Normalizing);
        let verdict = normalize::normalize(&reply.raw_text);
        info!(
            provider = %reply.provider_id,
            model = %reply.model_id,
            recommendation = %verdict.recommendation,
            "verdict ready"
        );

        Outcome::Analyzed {
            content,
            verdict,
            provider_id: reply.provider_id,
            model_id: reply.model_id,
            was_truncated,
            ceiling: snapshot.token_ceiling,
        }
    }
}
