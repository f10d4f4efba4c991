//! Anthropic messages API.

use super::{ChatProtocol, count_at, insert_secret_header, join_text, json_headers};
use polychat_domain::{ApiError, ChatRole, TokenUsage};
use polychat_ports::{ChatRequest, ChatResponse, ChatTarget, ProtocolFamily, ProviderId};
use polychat_shared::Result;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use url::Url;

const API_KEY_HEADER: &str = "x-api-key";
const VERSION_HEADER: &str = "anthropic-version";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Strategy for the Anthropic messages protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicProtocol;

/// Conversation split into the top-level system text and the turns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnthropicMessages {
    system: Option<String>,
    turns: Vec<AnthropicMessage>,
}

/// One user or assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnthropicMessage {
    role: &'static str,
    content: String,
}

/// Messages request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnthropicRequestBody {
    model: Box<str>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl ChatProtocol for AnthropicProtocol {
    const FAMILY: ProtocolFamily = ProtocolFamily::Anthropic;
    type Messages = AnthropicMessages;
    type Body = AnthropicRequestBody;

    fn request_url(&self, endpoint: Url, _: &ChatTarget, _: &ChatRequest) -> Result<Url> {
        Ok(endpoint)
    }

    fn transform_messages(&self, request: &ChatRequest) -> Self::Messages {
        let mut system_chunks: Vec<&str> = request.effective_system_prompt().into_iter().collect();
        let mut turns = Vec::with_capacity(request.messages.len());

        for message in &request.messages {
            match message.role {
                ChatRole::System => {
                    let content = message.content.trim();
                    if !content.is_empty() {
                        system_chunks.push(content);
                    }
                },
                ChatRole::User | ChatRole::Assistant => turns.push(AnthropicMessage {
                    role: message.role.as_str(),
                    content: message.content.clone(),
                }),
            }
        }

        let system = (!system_chunks.is_empty()).then(|| system_chunks.join("\n\n"));
        AnthropicMessages { system, turns }
    }

    fn build_headers(&self, _: &ChatTarget, request: &ChatRequest) -> Result<HeaderMap> {
        let mut headers = json_headers();
        insert_secret_header(
            &mut headers,
            &request.provider,
            API_KEY_HEADER,
            request.credential.expose(),
        )?;
        headers.insert(VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_request_body(
        &self,
        target: &ChatTarget,
        request: &ChatRequest,
        messages: Self::Messages,
    ) -> Self::Body {
        AnthropicRequestBody {
            model: target.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: messages.system,
            messages: messages.turns,
            temperature: request.temperature,
        }
    }

    fn parse_response(
        &self,
        provider: &ProviderId,
        body: &Value,
    ) -> std::result::Result<ChatResponse, ApiError> {
        let blocks = body
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::invalid_response(provider, "response has no `content` array"))?;

        let text_blocks = blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"));
        let content = join_text(provider, text_blocks, "content[]")?;
        if content.is_empty() {
            return Err(ApiError::empty_response(provider));
        }

        Ok(ChatResponse {
            content,
            model: body.get("model").and_then(Value::as_str).map(str::to_owned),
            usage: TokenUsage::from_counts(
                count_at(body, "/usage/input_tokens"),
                count_at(body, "/usage/output_tokens"),
                None,
            ),
        })
    }
}
