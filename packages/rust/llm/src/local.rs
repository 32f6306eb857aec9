//! Self-hosted model servers.
//!
//! Local servers disagree on API shape and offer no capability discovery, so
//! the call walks an ordered list of [`LocalAttempt`]s and keeps the first
//! reply that parses. Ollama endpoints get the generate API only; anything
//! else tries chat completions and then a bare completion body.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use triage_shared::{Result, TriageError};

use crate::gateway::{CallParams, error_detail};
use crate::openai::{ChatMessage, ChatRequest, ChatResponse};

/// Model id reported when none is configured.
pub const REPORTED_MODEL: &str = "local";

const OLLAMA_DEFAULT_MODEL: &str = "llama2";
const GENERIC_DEFAULT_MODEL: &str = "default";

/// One request shape to try against a local endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAttempt {
    /// `{model, prompt, stream: false}`, reply in `response`.
    OllamaGenerate,
    /// OpenAI-compatible chat completions.
    ChatCompletion,
    /// `{prompt, max_tokens, temperature}`, reply in `text`, `response` or `completion`.
    BareCompletion,
}

/// Attempts for `endpoint`, in order.
pub fn attempt_plan(endpoint: &str) -> &'static [LocalAttempt] {
    if endpoint.contains("ollama") || endpoint.contains(":11434") {
        &[LocalAttempt::OllamaGenerate]
    } else {
        &[LocalAttempt::ChatCompletion, LocalAttempt::BareCompletion]
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    max_tokens: u32,
    temperature: f32,
}

/// Returns `(reply text, model id)`.
pub(crate) async fn call(params: &CallParams<'_>) -> Result<(String, String)> {
    let endpoint = params
        .settings
        .endpoint
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            TriageError::gateway("Local LLM request failed: no endpoint configured")
        })?;

    let mut last_failure = String::new();
    for attempt in attempt_plan(endpoint) {
        debug!(?attempt, %endpoint, "trying local request shape");
        match run_attempt(*attempt, endpoint, params).await {
            Ok(text) => {
                let model = params
                    .settings
                    .model
                    .clone()
                    .unwrap_or_else(|| REPORTED_MODEL.to_string());
                return Ok((text, model));
            }
            Err(reason) => {
                warn!(?attempt, %reason, "local request shape failed");
                last_failure = reason;
            }
        }
    }

    Err(TriageError::gateway(format!(
        "Local LLM request failed: {last_failure}"
    )))
}

/// One attempt; the error is a bare reason string.
async fn run_attempt(
    attempt: LocalAttempt,
    endpoint: &str,
    params: &CallParams<'_>,
) -> std::result::Result<String, String> {
    let combined_prompt = format!("{}\n\nContent to analyze:\n\n{}", params.prompt, params.text);
    let request = params.client.post(endpoint);

    let request = match attempt {
        LocalAttempt::OllamaGenerate => request.json(&GenerateRequest {
            model: params.settings.model.as_deref().unwrap_or(OLLAMA_DEFAULT_MODEL),
            prompt: combined_prompt,
            stream: false,
        }),
        LocalAttempt::ChatCompletion => {
            let user_content = format!(
                "Please analyze this content and provide your recommendation:\n\n{}",
                params.text
            );
            request.json(&ChatRequest {
                model: params.settings.model.as_deref().unwrap_or(GENERIC_DEFAULT_MODEL),
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
            })
        }
        LocalAttempt::BareCompletion => request.json(&CompletionRequest {
            prompt: combined_prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        }),
    };

    let resp = request.send().await.map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(error_detail(resp).await);
    }

    match attempt {
        LocalAttempt::OllamaGenerate => resp
            .json::<GenerateResponse>()
            .await
            .map_err(|e| format!("invalid reply: {e}"))?
            .response
            .ok_or_else(|| "reply has no response field".to_string()),
        LocalAttempt::ChatCompletion => resp
            .json::<ChatResponse>()
            .await
            .map_err(|e| format!("invalid reply: {e}"))?
            .into_text()
            .ok_or_else(|| "reply has no message content".to_string()),
        LocalAttempt::BareCompletion => {
            let body: Value = resp
                .json()
                .await
                .map_err(|e| format!("invalid reply: {e}"))?;
            ["text", "response", "completion"]
                .iter()
                .find_map(|key| body.get(key).and_then(Value::as_str))
                .map(str::to_string)
                .ok_or_else(|| "reply has no text, response, or completion field".to_string())
        }
    }
}
