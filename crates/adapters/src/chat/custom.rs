//! Arbitrary OpenAI-compatible endpoints.
//!
//! The request mirrors the OpenAI body; credentials follow the catalog's
//! auth scheme. The parser tolerates both `choices[0].message.content` and
//! an Anthropic-style `content[].text` list.

use super::openai::{self, OpenAiMessage, OpenAiRequestBody};
use super::{
    ChatProtocol, bearer_headers, insert_secret_header, join_text, json_headers,
    with_query_credential,
};
use polychat_domain::{ApiError, AuthScheme};
use polychat_ports::{ChatRequest, ChatResponse, ChatTarget, ProtocolFamily, ProviderId};
use polychat_shared::Result;
use reqwest::header::HeaderMap;
use serde_json::Value;
use url::Url;

/// Strategy for self-hosted or third-party compatible servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomProtocol;

impl ChatProtocol for CustomProtocol {
    const FAMILY: ProtocolFamily = ProtocolFamily::Custom;
    type Messages = Vec<OpenAiMessage>;
    type Body = OpenAiRequestBody;

    fn request_url(&self, endpoint: Url, target: &ChatTarget, request: &ChatRequest) -> Result<Url> {
        Ok(match &target.auth {
            AuthScheme::Query { name } => with_query_credential(endpoint, name, &request.credential),
            AuthScheme::Bearer | AuthScheme::Header { .. } => endpoint,
        })
    }

    fn transform_messages(&self, request: &ChatRequest) -> Self::Messages {
        openai::transform_messages(request)
    }

    fn build_headers(&self, target: &ChatTarget, request: &ChatRequest) -> Result<HeaderMap> {
        match &target.auth {
            AuthScheme::Bearer => bearer_headers(&request.provider, &request.credential),
            AuthScheme::Header { name } => {
                let mut headers = json_headers();
                insert_secret_header(
                    &mut headers,
                    &request.provider,
                    name,
                    request.credential.expose(),
                )?;
                Ok(headers)
            },
            AuthScheme::Query { .. } => Ok(json_headers()),
        }
    }

    fn build_request_body(
        &self,
        target: &ChatTarget,
        request: &ChatRequest,
        messages: Self::Messages,
    ) -> Self::Body {
        openai::build_body(target, request, messages)
    }

    fn parse_response(
        &self,
        provider: &ProviderId,
        body: &Value,
    ) -> std::result::Result<ChatResponse, ApiError> {
        let choices = body.get("choices").and_then(Value::as_array);
        let blocks = body.get("content").and_then(Value::as_array);
        if choices.is_none() && blocks.is_none() {
            return Err(ApiError::invalid_response(
                provider,
                "response has neither `choices` nor `content`",
            ));
        }

        let choice_content = choices
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.pointer("/message/content"));
        let from_choices = match choice_content {
            Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
            _ => None,
        };
        let content = match (from_choices, blocks) {
            (Some(text), _) => Some(text),
            (None, Some(blocks)) => {
                let joined = join_text(provider, blocks, "content[]")?;
                (!joined.is_empty()).then_some(joined)
            },
            (None, None) => None,
        };
        if content.is_none() && choice_content.is_some_and(|value| !value.is_string()) {
            return Err(ApiError::invalid_response(
                provider,
                "`choices[0].message.content` is not a string",
            ));
        }

        let content = content.ok_or_else(|| ApiError::empty_response(provider))?;
        Ok(ChatResponse {
            content,
            model: openai::model_of(body),
            usage: openai::usage_of(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polychat_domain::{ApiErrorCode, ChatMessage};
    use serde_json::json;

    fn provider() -> ProviderId {
        ProviderId::parse("custom").expect("provider id")
    }

    fn request() -> ChatRequest {
        ChatRequest::new(provider(), "tok-123", vec![ChatMessage::user("hi")]) // pragma: allowlist secret
    }

    #[test]
    fn accepts_both_known_shapes() {
        let choices = json!({ "choices": [{ "message": { "content": "from choices" } }] });
        let blocks = json!({ "content": [{ "type": "text", "text": "from " }, { "text": "blocks" }] });

        let first = CustomProtocol.parse_response(&provider(), &choices).expect("choices");
        let second = CustomProtocol.parse_response(&provider(), &blocks).expect("blocks");
        assert_eq!(first.content, "from choices");
        assert_eq!(second.content, "from blocks");
    }

    #[test]
    fn known_shape_without_text_is_empty_and_unknown_shape_is_invalid() {
        let code = |body: Value| {
            CustomProtocol
                .parse_response(&provider(), &body)
                .err()
                .map(|error| error.code)
        };
        assert_eq!(code(json!({ "choices": [] })), Some(ApiErrorCode::EmptyResponse));
        assert_eq!(
            code(json!({ "content": [{ "type": "image" }] })),
            Some(ApiErrorCode::EmptyResponse)
        );
        assert_eq!(code(json!({ "output": "hi" })), Some(ApiErrorCode::InvalidResponse));
    }

    #[test]
    fn non_string_content_is_invalid_unless_blocks_carry_text() {
        let code = |body: Value| {
            CustomProtocol
                .parse_response(&provider(), &body)
                .err()
                .map(|error| error.code)
        };
        assert_eq!(
            code(json!({ "choices": [{ "message": { "content": null } }] })),
            Some(ApiErrorCode::InvalidResponse)
        );
        assert_eq!(
            code(json!({ "content": [{ "type": "text", "text": ["a"] }] })),
            Some(ApiErrorCode::InvalidResponse)
        );

        let mixed = json!({
            "choices": [{ "message": { "content": 5 } }],
            "content": [{ "text": "fallback" }]
        });
        let response = CustomProtocol.parse_response(&provider(), &mixed).expect("blocks");
        assert_eq!(response.content, "fallback");
    }

    #[test]
    fn header_auth_uses_named_header() -> Result<()> {
        let target = ChatTarget::new("https://llm.example.com/v1/chat", "m").with_auth(
            AuthScheme::Header {
                name: "X-LLM-Token".to_string(),
            },
        );
        let headers = CustomProtocol.build_headers(&target, &request())?;
        assert!(headers.get("x-llm-token").is_some());
        assert!(headers.get("authorization").is_none());
        Ok(())
    }

    #[test]
    fn query_auth_appends_parameter() -> Result<()> {
        let target = ChatTarget::new("https://llm.example.com/v1/chat", "m").with_auth(
            AuthScheme::Query {
                name: "api_key".to_string(),
            },
        );
        let endpoint = Url::parse(&target.endpoint).expect("url");
        let url = CustomProtocol.request_url(endpoint, &target, &request())?;
        assert_eq!(url.query(), Some("api_key=tok-123"));
        assert!(CustomProtocol.build_headers(&target, &request())?.get("authorization").is_none());
        Ok(())
    }
}
