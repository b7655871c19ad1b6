//! Translate Anthropic Messages API requests into `OpenAI` Chat Completions requests.
//!
//! Content blocks are flattened to plain text, the system prompt becomes a leading
//! `system` message, and sampling parameters fall back to conventional defaults
//! when the client leaves them unset.

use super::anthropic_types::MessagesRequest;
use super::content::extract;
use super::openai_types::{ChatCompletionRequest, ChatMessage};
use crate::error::{ProxyError, Result};
use crate::models::ModelMap;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 1.0;

/// A parsed client request, ready to be sent to the backend.
#[derive(Debug, Clone)]
pub struct TranslatedRequest {
    /// The model name exactly as the client sent it, before alias resolution.
    pub original_model: String,
    pub stream: bool,
    pub backend: ChatCompletionRequest,
}

/// Parse a raw request body and translate it in one step.
pub fn translate_request(body: &[u8], models: &ModelMap) -> Result<TranslatedRequest> {
    let req: MessagesRequest =
        serde_json::from_slice(body).map_err(|e| ProxyError::invalid_request(e.to_string()))?;

    Ok(TranslatedRequest {
        original_model: req.model.clone(),
        stream: req.stream,
        backend: anthropic_to_openai(&req, models),
    })
}

/// Translate an Anthropic Messages API request into an `OpenAI` Chat Completions request.
/// Pure function: takes the request + model mapping, returns the translated request.
pub fn anthropic_to_openai(req: &MessagesRequest, models: &ModelMap) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);

    let system = extract(req.system.as_ref());
    if !system.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system,
        });
    }

    messages.extend(req.messages.iter().map(|msg| ChatMessage {
        role: msg.role.clone(),
        content: extract(msg.content.as_ref()),
    }));

    ChatCompletionRequest {
        model: models.resolve(&req.model).to_string(),
        messages,
        max_tokens: req.max_tokens,
        temperature: req.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        top_p: req.top_p.unwrap_or(DEFAULT_TOP_P),
        stream: req.stream,
    }
}
