//! OpenAI-compatible chat completions.
//!
//! Also serves deepseek, mistral, groq, openrouter and other providers that
//! speak the same `messages`/`choices` shape.

use super::{ChatProtocol, bearer_headers, count_at};
use polychat_domain::{ApiError, ChatRole, TokenUsage};
use polychat_ports::{ChatRequest, ChatResponse, ChatTarget, ProtocolFamily, ProviderId};
use polychat_shared::Result;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Provider id that takes `max_completion_tokens` instead of `max_tokens`.
const OPENAI_PROVIDER_ID: &str = "openai";

/// Strategy for the OpenAI chat-completions protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiProtocol;

/// One entry of the `messages` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenAiMessage {
    role: &'static str,
    content: String,
}

/// Chat-completions request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiRequestBody {
    model: Box<str>,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

impl ChatProtocol for OpenAiProtocol {
    const FAMILY: ProtocolFamily = ProtocolFamily::OpenAi;
    type Messages = Vec<OpenAiMessage>;
    type Body = OpenAiRequestBody;

    fn request_url(&self, endpoint: Url, _: &ChatTarget, _: &ChatRequest) -> Result<Url> {
        Ok(endpoint)
    }

    fn transform_messages(&self, request: &ChatRequest) -> Self::Messages {
        transform_messages(request)
    }

    fn build_headers(&self, _: &ChatTarget, request: &ChatRequest) -> Result<HeaderMap> {
        bearer_headers(&request.provider, &request.credential)
    }

    fn build_request_body(
        &self,
        target: &ChatTarget,
        request: &ChatRequest,
        messages: Self::Messages,
    ) -> Self::Body {
        build_body(target, request, messages)
    }

    fn parse_response(
        &self,
        provider: &ProviderId,
        body: &Value,
    ) -> std::result::Result<ChatResponse, ApiError> {
        parse_choices(provider, body)
    }
}

/// System prompt first, then the conversation with roles kept inline.
pub(crate) fn transform_messages(request: &ChatRequest) -> Vec<OpenAiMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(prompt) = request.effective_system_prompt() {
        messages.push(OpenAiMessage {
            role: ChatRole::System.as_str(),
            content: prompt.to_owned(),
        });
    }
    messages.extend(request.messages.iter().map(|message| OpenAiMessage {
        role: message.role.as_str(),
        content: message.content.clone(),
    }));
    messages
}

pub(crate) fn build_body(
    target: &ChatTarget,
    request: &ChatRequest,
    messages: Vec<OpenAiMessage>,
) -> OpenAiRequestBody {
    let (max_tokens, max_completion_tokens) =
        if request.provider.as_str() == OPENAI_PROVIDER_ID {
            (None, request.max_tokens)
        } else {
            (request.max_tokens, None)
        };

    OpenAiRequestBody {
        model: target.model.clone(),
        messages,
        temperature: request.temperature,
        max_tokens,
        max_completion_tokens,
    }
}

fn parse_choices(provider: &ProviderId, body: &Value) -> std::result::Result<ChatResponse, ApiError> {
    let choices = body
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::invalid_response(provider, "response has no `choices` array"))?;
    let first = choices
        .first()
        .ok_or_else(|| ApiError::empty_response(provider))?;

    let content = match first.pointer("/message/content") {
        Some(Value::String(content)) => content,
        _ => {
            return Err(ApiError::invalid_response(
                provider,
                "`choices[0].message.content` is not a string",
            ));
        },
    };
    if content.is_empty() {
        return Err(ApiError::empty_response(provider));
    }

    Ok(ChatResponse {
        content: content.clone(),
        model: model_of(body),
        usage: usage_of(body),
    })
}

pub(crate) fn model_of(body: &Value) -> Option<String> {
    body.get("model").and_then(Value::as_str).map(str::to_owned)
}

pub(crate) fn usage_of(body: &Value) -> TokenUsage {
    TokenUsage::from_counts(
        count_at(body, "/usage/prompt_tokens"),
        count_at(body, "/usage/completion_tokens"),
        count_at(body, "/usage/total_tokens"),
    )
}
