//! Shared types, error model, and configuration for Triage.
//!
//! This crate is the foundation depended on by all other Triage crates.
//! It provides:
//! - [`TriageError`]: the unified error type
//! - Domain types ([`ArtifactInput`], [`ProcessingResult`], [`ArtifactRecord`], [`ArtifactId`])
//! - Configuration ([`AppConfig`] from the config file, [`PipelineConfig`] from the store)

pub mod config;
pub mod error;
pub mod pipeline_config;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DeliveryConfig, ExtractionConfig, GatewayConfig, StorageConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from,
};
pub use error::{Result, TriageError};
pub use pipeline_config::{
    DEFAULT_INSTRUCTION_PROMPT, DEFAULT_TOKEN_CEILING, MIN_TOKEN_CEILING, PipelineConfig,
    ProviderId, ProviderSettings,
};
pub use types::{
    ArtifactId, ArtifactInput, ArtifactKind, ArtifactRecord, Payload, ProcessingResult,
    Recommendation, TRUNCATION_MARKER,
};
