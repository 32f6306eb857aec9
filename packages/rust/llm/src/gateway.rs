//! The gateway contract and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{info, instrument};

use triage_shared::{GatewayConfig, ProviderId, ProviderSettings, Result, TriageError};

use crate::directive::with_directive;
use crate::{anthropic, local, openai};

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Unstructured model output plus the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub raw_text: String,
    pub provider_id: String,
    pub model_id: String,
}

/// One request/response contract over every model backend.
///
/// Failures are [`TriageError::Gateway`]. Implementations never retry.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn invoke(
        &self,
        instruction: &str,
        text: &str,
        provider: ProviderId,
        settings: &ProviderSettings,
    ) -> Result<ModelReply>;
}

// ---------------------------------------------------------------------------
// HTTP gateway
// ---------------------------------------------------------------------------

/// Everything a provider call needs, borrowed for the duration of one call.
pub(crate) struct CallParams<'a> {
    pub client: &'a Client,
    /// Instruction with the format directive already appended.
    pub prompt: &'a str,
    pub text: &'a str,
    pub settings: &'a ProviderSettings,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Talks to the real provider APIs over HTTP.
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TriageError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    #[instrument(skip_all, fields(provider = %provider, chars = text.len()))]
    async fn invoke(
        &self,
        instruction: &str,
        text: &str,
        provider: ProviderId,
        settings: &ProviderSettings,
    ) -> Result<ModelReply> {
        let prompt = with_directive(instruction);
        let params = CallParams {
            client: &self.client,
            prompt: &prompt,
            text,
            settings,
            max_tokens: self.config.max_output_tokens,
            temperature: self.config.temperature,
        };

        let (raw_text, model_id) = match provider {
            ProviderId::OpenAi => openai::call(&params).await?,
            ProviderId::Anthropic => anthropic::call(&params).await?,
            ProviderId::Local => local::call(&params).await?,
        };

        info!(model = %model_id, reply_chars = raw_text.len(), "model replied");
        Ok(ModelReply {
            raw_text,
            provider_id: provider.as_str().to_string(),
            model_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP helpers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// The API's `error.message` when present, otherwise the HTTP status text.
pub(crate) async fn error_detail(resp: Response) -> String {
    let status = resp.status();
    let status_text = status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string());

    match resp.json::<ApiErrorBody>().await {
        Ok(ApiErrorBody {
            error: Some(ApiErrorDetail {
                message: Some(message),
            }),
        }) => message,
        _ => status_text,
    }
}
