//! Pipeline configuration: the steering prompt, the active provider, per-provider
//! settings, and the token ceiling.
//!
//! The store keeps this as a flat string map (see `triage-storage`). A
//! [`PipelineConfig`] is an immutable snapshot taken once per processing run.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};
use crate::types::TRUNCATION_MARKER;

/// Store key for the steering instruction.
pub const KEY_SYSTEM_PROMPT: &str = "system_prompt";
/// Store key for the active provider id.
pub const KEY_DEFAULT_PROVIDER: &str = "default_provider";
/// Store key for the JSON-encoded provider settings map.
pub const KEY_PROVIDERS: &str = "providers";
/// Store key for the token ceiling.
pub const KEY_MAX_TOKENS: &str = "max_tokens";

/// Default steering instruction sent to the model.
pub const DEFAULT_INSTRUCTION_PROMPT: &str = "Analyze this content and provide a recommendation: \"Read\" if the content is valuable, informative, or relevant to the user's interests, or \"Discard\" if it's spam, low-quality, or irrelevant. Provide a brief reasoning for your decision.";

/// Default token ceiling.
pub const DEFAULT_TOKEN_CEILING: usize = 100_000;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Smallest ceiling that still fits the truncation marker.
pub const MIN_TOKEN_CEILING: usize = TRUNCATION_MARKER.len().div_ceil(CHARS_PER_TOKEN);

// ---------------------------------------------------------------------------
// ProviderId
// ---------------------------------------------------------------------------

/// Model backend identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Hosted chat-completion provider.
    OpenAi,
    /// Hosted single-message provider.
    Anthropic,
    /// Self-hosted server (Ollama or OpenAI-compatible).
    Local,
}

impl ProviderId {
    /// All known providers.
    pub const ALL: [ProviderId; 3] = [Self::OpenAi, Self::Anthropic, Self::Local];

    /// Stable string form used in the store and in records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "local" => Ok(Self::Local),
            other => Err(TriageError::config(format!(
                "unsupported provider: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderSettings
// ---------------------------------------------------------------------------

/// Credentials and endpoint for one provider. Which fields matter depends on
/// the provider: hosted ones need `api_key`, `local` needs `endpoint`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Full request URL. Optional for hosted providers (overrides the public API URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderSettings {
    /// Copy with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|key| {
                let tail: String = key
                    .chars()
                    .rev()
                    .take(4)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                format!("****{tail}")
            }),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Snapshot of everything a processing run reads from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub instruction_prompt: String,
    pub active_provider: ProviderId,
    pub providers: BTreeMap<ProviderId, ProviderSettings>,
    pub token_ceiling: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            instruction_prompt: DEFAULT_INSTRUCTION_PROMPT.to_string(),
            active_provider: ProviderId::OpenAi,
            providers: BTreeMap::new(),
            token_ceiling: DEFAULT_TOKEN_CEILING,
        }
    }
}

impl PipelineConfig {
    /// Settings for the active provider, or a config error when none are stored.
    pub fn active_settings(&self) -> Result<&ProviderSettings> {
        self.providers.get(&self.active_provider).ok_or_else(|| {
            TriageError::config(format!(
                "no configuration found for provider: {}",
                self.active_provider
            ))
        })
    }

    /// Reject values no processing run could use.
    pub fn validate(&self) -> Result<()> {
        if self.token_ceiling < MIN_TOKEN_CEILING {
            return Err(TriageError::config(format!(
                "token ceiling {} is below the minimum of {MIN_TOKEN_CEILING}",
                self.token_ceiling
            )));
        }
        Ok(())
    }

    /// Build a snapshot from the store's key/value map. Missing keys take defaults.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let defaults = Self::default();

        let instruction_prompt = map
            .get(KEY_SYSTEM_PROMPT)
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .unwrap_or(defaults.instruction_prompt);

        let active_provider = match map.get(KEY_DEFAULT_PROVIDER) {
            Some(id) => id.parse()?,
            None => defaults.active_provider,
        };

        let providers = match map.get(KEY_PROVIDERS) {
            Some(json) => parse_providers(json)?,
            None => BTreeMap::new(),
        };

        let token_ceiling = match map.get(KEY_MAX_TOKENS) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                TriageError::config(format!("invalid {KEY_MAX_TOKENS} value {raw:?}: {e}"))
            })?,
            None => defaults.token_ceiling,
        };

        Ok(Self {
            instruction_prompt,
            active_provider,
            providers,
            token_ceiling,
        })
    }

    /// Flatten into the store's key/value map.
    pub fn to_map(&self) -> Result<BTreeMap<String, String>> {
        let providers: BTreeMap<&str, &ProviderSettings> = self
            .providers
            .iter()
            .map(|(id, settings)| (id.as_str(), settings))
            .collect();
        let providers_json = serde_json::to_string(&providers)
            .map_err(|e| TriageError::config(format!("failed to encode providers: {e}")))?;

        let mut map = BTreeMap::new();
        map.insert(KEY_SYSTEM_PROMPT.to_string(), self.instruction_prompt.clone());
        map.insert(
            KEY_DEFAULT_PROVIDER.to_string(),
            self.active_provider.as_str().to_string(),
        );
        map.insert(KEY_PROVIDERS.to_string(), providers_json);
        map.insert(KEY_MAX_TOKENS.to_string(), self.token_ceiling.to_string());
        Ok(map)
    }
}

/// Decode the providers JSON object. Unknown provider ids are skipped.
fn parse_providers(json: &str) -> Result<BTreeMap<ProviderId, ProviderSettings>> {
    let raw: BTreeMap<String, ProviderSettings> = serde_json::from_str(json)
        .map_err(|e| TriageError::config(format!("invalid {KEY_PROVIDERS} JSON: {e}")))?;

    let mut providers = BTreeMap::new();
    for (key, settings) in raw {
        match key.parse::<ProviderId>() {
            Ok(id) => {
                providers.insert(id, settings);
            }
            Err(_) => tracing::warn!(provider = %key, "ignoring settings for unknown provider"),
        }
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_settings() -> ProviderSettings {
        ProviderSettings {
            api_key: Some("sk-test-1234".into()),
            endpoint: None,
            model: Some("gpt-4".into()),
        }
    }

    #[test]
    fn defaults_from_empty_map() {
        let config = PipelineConfig::from_map(&BTreeMap::new()).expect("parse");
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.token_ceiling, 100_000);
        assert_eq!(config.active_provider, ProviderId::OpenAi);
    }

    #[test]
    fn map_roundtrip() {
        let mut config = PipelineConfig {
            instruction_prompt: "Is this worth reading?".into(),
            active_provider: ProviderId::Anthropic,
            token_ceiling: 4_000,
            ..Default::default()
        };
        config.providers.insert(ProviderId::OpenAi, openai_settings());
        config.providers.insert(
            ProviderId::Local,
            ProviderSettings {
                endpoint: Some("http://localhost:11434/api/generate".into()),
                ..Default::default()
            },
        );

        let map = config.to_map().expect("to_map");
        assert_eq!(map[KEY_DEFAULT_PROVIDER], "anthropic");
        assert!(map[KEY_PROVIDERS].contains("\"openai\""));

        let parsed = PipelineConfig::from_map(&map).expect("from_map");
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_active_provider_is_config_error() {
        let config = PipelineConfig::default();
        let err = config.active_settings().unwrap_err();
        assert!(matches!(err, TriageError::Config { .. }));
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn unknown_provider_id_rejected() {
        let mut map = BTreeMap::new();
        map.insert(KEY_DEFAULT_PROVIDER.to_string(), "mistral".to_string());
        let err = PipelineConfig::from_map(&map).unwrap_err();
        assert!(err.to_string().contains("unsupported provider: mistral"));
    }

    #[test]
    fn unknown_provider_entries_are_skipped() {
        let mut map = BTreeMap::new();
        map.insert(
            KEY_PROVIDERS.to_string(),
            r#"{"openai":{"api_key":"k"},"cohere":{"api_key":"x"}}"#.to_string(),
        );
        let config = PipelineConfig::from_map(&map).expect("parse");
        assert_eq!(config.providers.len(), 1);
        assert!(config.providers.contains_key(&ProviderId::OpenAi));
    }

    #[test]
    fn invalid_ceiling_rejected() {
        let mut map = BTreeMap::new();
        map.insert(KEY_MAX_TOKENS.to_string(), "lots".to_string());
        assert!(PipelineConfig::from_map(&map).is_err());

        let config = PipelineConfig {
            token_ceiling: MIN_TOKEN_CEILING - 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn min_ceiling_fits_marker() {
        assert!(MIN_TOKEN_CEILING * CHARS_PER_TOKEN >= TRUNCATION_MARKER.len());
        assert!((MIN_TOKEN_CEILING - 1) * CHARS_PER_TOKEN < TRUNCATION_MARKER.len());
    }

    #[test]
    fn redacted_masks_key() {
        let shown = openai_settings().redacted();
        assert_eq!(shown.api_key.as_deref(), Some("****1234"));
        assert_eq!(shown.model.as_deref(), Some("gpt-4"));
    }
}
