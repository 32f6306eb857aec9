//! Hosted chat-completion provider.
//!
//! Instruction in the system slot, content in the user slot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use triage_shared::{Result, TriageError};

use crate::gateway::{CallParams, error_detail};

/// Public chat-completions URL.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

// ---------------------------------------------------------------------------
// Wire types (shared with OpenAI-compatible local servers)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice.
    pub(crate) fn into_text(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// Returns `(reply text, model id)`.
pub(crate) async fn call(params: &CallParams<'_>) -> Result<(String, String)> {
    let model = params.settings.model.as_deref().unwrap_or(DEFAULT_MODEL);
    let endpoint = params.settings.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
    let api_key = params.settings.api_key.as_deref().unwrap_or_default();
    let user_content = format!("Please analyze this content:\n\n{}", params.text);

    let body = ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: params.prompt,
            },
            ChatMessage {
                role: "user",
                content: &user_content,
            },
        ],
        max_tokens: params.max_tokens,
        temperature: params.temperature,
    };

    debug!(%model, %endpoint, "calling chat-completion provider");
    let resp = params
        .client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| TriageError::gateway(format!("OpenAI request failed: {e}")))?;

    if !resp.status().is_success() {
        let detail = error_detail(resp).await;
        return Err(TriageError::gateway(format!("OpenAI API error: {detail}")));
    }

    let parsed: ChatResponse = resp
        .json()
        .await
        .map_err(|e| TriageError::gateway(format!("OpenAI request failed: invalid reply: {e}")))?;
    let text = parsed.into_text().ok_or_else(|| {
        TriageError::gateway("OpenAI request failed: reply has no message content")
    })?;

    Ok((text, model.to_string()))
}
