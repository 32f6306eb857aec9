//! Hosted single-message provider: instruction and content in one user turn.

use serde::{Deserialize, Serialize};
use tracing::debug;

use triage_shared::{Result, TriageError};

use crate::gateway::{CallParams, error_detail};

/// Public messages URL.
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<UserMessage>,
}

#[derive(Debug, Serialize)]
struct UserMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Returns `(reply text, model id)`.
pub(crate) async fn call(params: &CallParams<'_>) -> Result<(String, String)> {
    let model = params.settings.model.as_deref().unwrap_or(DEFAULT_MODEL);
    let endpoint = params.settings.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
    let api_key = params.settings.api_key.as_deref().unwrap_or_default();

    let body = MessagesRequest {
        model,
        max_tokens: params.max_tokens,
        messages: vec![UserMessage {
            role: "user",
            content: format!("{}\n\nContent to analyze:\n\n{}", params.prompt, params.text),
        }],
    };

    debug!(%model, %endpoint, "calling messages provider");
    let resp = params
        .client
        .post(endpoint)
        .header("x-api-key", api_key)
        .header("anthropic-version", API_VERSION)
        .json(&body)
        .send()
        .await
        .map_err(|e| TriageError::gateway(format!("Anthropic request failed: {e}")))?;

    if !resp.status().is_success() {
        let detail = error_detail(resp).await;
        return Err(TriageError::gateway(format!("Anthropic API error: {detail}")));
    }

    let parsed: MessagesResponse = resp.json().await.map_err(|e| {
        TriageError::gateway(format!("Anthropic request failed: invalid reply: {e}"))
    })?;
    let text = parsed
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .ok_or_else(|| TriageError::gateway("Anthropic request failed: reply has no text block"))?;

    Ok((text, model.to_string()))
}
