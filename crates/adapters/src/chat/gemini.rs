//! Google Gemini `generateContent`.

use super::{ChatProtocol, count_at, join_text, json_headers, with_query_credential};
use polychat_domain::{ApiError, ChatRole, EndpointError, TokenUsage};
use polychat_ports::{ChatRequest, ChatResponse, ChatTarget, ProtocolFamily, ProviderId};
use polychat_shared::{ErrorEnvelope, Result};
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use url::Url;

const KEY_PARAM: &str = "key";
const USER_ROLE: &str = "user";
const MODEL_ROLE: &str = "model";

/// Strategy for the Gemini `generateContent` protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiProtocol;

/// One entry of `contents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

/// A text part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeminiPart {
    text: String,
}

/// Sampling knobs; omitted entirely when nothing is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// `generateContent` request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequestBody {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GeminiContent {
    fn text(role: &'static str, text: &str) -> Self {
        Self {
            role,
            parts: vec![GeminiPart {
                text: text.to_owned(),
            }],
        }
    }
}

impl ChatProtocol for GeminiProtocol {
    const FAMILY: ProtocolFamily = ProtocolFamily::Gemini;
    type Messages = Vec<GeminiContent>;
    type Body = GeminiRequestBody;

    fn request_url(
        &self,
        endpoint: Url,
        target: &ChatTarget,
        request: &ChatRequest,
    ) -> Result<Url> {
        let mut url = endpoint;
        url.path_segments_mut()
            .map_err(|()| {
                ErrorEnvelope::from(ApiError::from(EndpointError::Malformed {
                    reason: "endpoint cannot carry a path".to_string(),
                }))
                .with_metadata("provider", request.provider.as_str())
            })?
            .pop_if_empty()
            .push(&format!("{}:generateContent", target.model));
        Ok(with_query_credential(url, KEY_PARAM, &request.credential))
    }

    fn transform_messages(&self, request: &ChatRequest) -> Self::Messages {
        let mut contents = Vec::with_capacity(request.messages.len() + 1);
        if let Some(prompt) = request.effective_system_prompt() {
            contents.push(GeminiContent::text(USER_ROLE, prompt));
        }
        contents.extend(request.messages.iter().map(|message| {
            let role = match message.role {
                ChatRole::Assistant => MODEL_ROLE,
                ChatRole::User | ChatRole::System => USER_ROLE,
            };
            GeminiContent::text(role, &message.content)
        }));
        contents
    }

    fn build_headers(&self, _: &ChatTarget, _: &ChatRequest) -> Result<HeaderMap> {
        Ok(json_headers())
    }

    fn build_request_body(
        &self,
        _: &ChatTarget,
        request: &ChatRequest,
        messages: Self::Messages,
    ) -> Self::Body {
        let generation_config = (request.temperature.is_some() || request.max_tokens.is_some())
            .then_some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            });
        GeminiRequestBody {
            contents: messages,
            generation_config,
        }
    }

    fn parse_response(
        &self,
        provider: &ProviderId,
        body: &Value,
    ) -> std::result::Result<ChatResponse, ApiError> {
        let candidates = body
            .get("candidates")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ApiError::invalid_response(provider, "response has no `candidates` array")
            })?;
        let first = candidates
            .first()
            .ok_or_else(|| ApiError::empty_response(provider))?;

        let parts = first
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let content = join_text(provider, parts, "candidates[0].content.parts[]")?;
        if content.is_empty() {
            return Err(ApiError::empty_response(provider));
        }

        Ok(ChatResponse {
            content,
            model: body
                .get("modelVersion")
                .and_then(Value::as_str)
                .map(str::to_owned),
            usage: TokenUsage::from_counts(
                count_at(body, "/usageMetadata/promptTokenCount"),
                count_at(body, "/usageMetadata/candidatesTokenCount"),
                count_at(body, "/usageMetadata/totalTokenCount"),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polychat_domain::{ApiErrorCode, ChatMessage};
    use serde_json::json;

    fn request() -> ChatRequest {
        ChatRequest::new(
            ProviderId::parse("gemini").expect("provider id"),
            "AIza-test", // pragma: allowlist secret
            vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
        )
        .with_system_prompt("be brief")
        .with_temperature(0.5)
    }

    #[test]
    fn url_embeds_model_and_key() -> Result<()> {
        let target = ChatTarget::new(
            "https://generativelanguage.googleapis.com/v1beta/models/",
            "gemini-2.0-flash",
        );
        let endpoint = Url::parse(&target.endpoint).expect("url");
        let url = GeminiProtocol.request_url(endpoint, &target, &request())?;
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent?key=AIza-test"
        );
        Ok(())
    }

    #[test]
    fn existing_query_survives_and_model_is_one_segment() -> Result<()> {
        let target = ChatTarget::new(
            "https://gateway.example.com/v1beta/models?alt=json",
            "tuned/gemini x",
        );
        let endpoint = Url::parse(&target.endpoint).expect("url");
        let url = GeminiProtocol.request_url(endpoint, &target, &request())?;
        assert_eq!(url.path(), "/v1beta/models/tuned%2Fgemini%20x:generateContent");
        assert_eq!(url.query(), Some("alt=json&key=AIza-test"));
        Ok(())
    }

    #[test]
    fn system_prompt_becomes_leading_user_turn() -> std::result::Result<(), serde_json::Error> {
        let request = request();
        let target = ChatTarget::new("https://example.com/models", "gemini-2.0-flash");
        let messages = GeminiProtocol.transform_messages(&request);
        let body =
            serde_json::to_value(GeminiProtocol.build_request_body(&target, &request, messages))?;

        assert_eq!(
            body,
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "be brief" }] },
                    { "role": "user", "parts": [{ "text": "hi" }] },
                    { "role": "model", "parts": [{ "text": "hello" }] }
                ],
                "generationConfig": { "temperature": 0.5 }
            })
        );
        Ok(())
    }

    #[test]
    fn parts_are_joined_and_usage_is_read() {
        let provider = ProviderId::parse("gemini").expect("provider id");
        let body = json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": "Hi" }, { "text": "!" }] } }],
            "usageMetadata": { "promptTokenCount": 5, "candidatesTokenCount": 2, "totalTokenCount": 7 },
            "modelVersion": "gemini-2.0-flash"
        });
        let response = GeminiProtocol.parse_response(&provider, &body).expect("parsed");
        assert_eq!(response.content, "Hi!");
        assert_eq!(response.usage.total_tokens, 7);
        assert_eq!(response.model.as_deref(), Some("gemini-2.0-flash"));
    }

    #[test]
    fn blocked_candidates_are_empty() {
        let provider = ProviderId::parse("gemini").expect("provider id");
        let code = |body: Value| {
            GeminiProtocol
                .parse_response(&provider, &body)
                .err()
                .map(|error| error.code)
        };
        assert_eq!(code(json!({})), Some(ApiErrorCode::InvalidResponse));
        assert_eq!(code(json!({ "candidates": [] })), Some(ApiErrorCode::EmptyResponse));
        assert_eq!(
            code(json!({ "candidates": [{ "finishReason": "SAFETY" }] })),
            Some(ApiErrorCode::EmptyResponse)
        );
    }

    #[test]
    fn non_string_part_text_is_invalid() {
        let provider = ProviderId::parse("gemini").expect("provider id");
        let body = json!({ "candidates": [{ "content": { "parts": [{ "text": { "x": 1 } }] } }] });
        let error = GeminiProtocol
            .parse_response(&provider, &body)
            .expect_err("object text");
        assert_eq!(error.code, ApiErrorCode::InvalidResponse);

        let inline = json!({ "candidates": [{ "content": { "parts": [{ "inlineData": {} }] } }] });
        let error = GeminiProtocol
            .parse_response(&provider, &inline)
            .expect_err("no text parts");
        assert_eq!(error.code, ApiErrorCode::EmptyResponse);
    }
}
