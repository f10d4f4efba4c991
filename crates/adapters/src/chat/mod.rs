//! Chat-completion adapters.
//!
//! Each protocol family is a [`ChatProtocol`] strategy. [`ProtocolAdapter`]
//! drives every strategy through the same flow:
//!
//! 1. validate the endpoint (before any network attempt)
//! 2. transform messages, build headers and body
//! 3. timed POST
//! 4. non-2xx -> `API_ERROR` with the status and a best-effort message
//! 5. decode JSON (`INVALID_RESPONSE` on failure) and hand it to the parser
//!
//! Nothing here retries.

pub mod anthropic;
pub mod custom;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicProtocol;
pub use custom::CustomProtocol;
pub use gemini::GeminiProtocol;
pub use openai::OpenAiProtocol;

use crate::http::{TimedHttpClient, TransportError};
use polychat_domain::{ApiError, EndpointValidator};
use polychat_ports::{
    BoxFuture, ChatProviderPort, ChatRequest, ChatResponse, ChatTarget, ProtocolFamily, ProviderId,
};
use polychat_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result, SecretString};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

const OPERATION: &str = "chat.send";

/// One wire protocol family.
pub trait ChatProtocol: Send + Sync + 'static {
    /// Family served by this strategy.
    const FAMILY: ProtocolFamily;

    /// Wire form of the conversation.
    type Messages: Send;

    /// Request body.
    type Body: Serialize + Send + Sync;

    /// Final URL for the POST, given the validated endpoint.
    fn request_url(
        &self,
        endpoint: Url,
        target: &ChatTarget,
        request: &ChatRequest,
    ) -> Result<Url>;

    /// Map the normalized conversation onto the wire roles.
    fn transform_messages(&self, request: &ChatRequest) -> Self::Messages;

    /// Authentication and protocol headers.
    fn build_headers(&self, target: &ChatTarget, request: &ChatRequest) -> Result<HeaderMap>;

    /// Assemble the request body.
    fn build_request_body(
        &self,
        target: &ChatTarget,
        request: &ChatRequest,
        messages: Self::Messages,
    ) -> Self::Body;

    /// Extract the completion from a decoded 2xx body.
    fn parse_response(
        &self,
        provider: &ProviderId,
        body: &Value,
    ) -> std::result::Result<ChatResponse, ApiError>;
}

/// Drives a [`ChatProtocol`] through the shared send flow.
pub struct ProtocolAdapter<P> {
    protocol: P,
    http: Arc<TimedHttpClient>,
    endpoints: EndpointValidator,
}

impl<P: ChatProtocol> ProtocolAdapter<P> {
    /// Wrap `protocol` with a shared HTTP client and endpoint policy.
    pub const fn new(protocol: P, http: Arc<TimedHttpClient>, endpoints: EndpointValidator) -> Self {
        Self {
            protocol,
            http,
            endpoints,
        }
    }

    async fn send_inner(
        &self,
        ctx: &RequestContext,
        target: ChatTarget,
        request: ChatRequest,
    ) -> Result<ChatResponse> {
        ctx.ensure_not_cancelled(OPERATION)?;
        let provider = request.provider.clone();

        let endpoint = self.endpoints.validate(&target.endpoint).map_err(|error| {
            ErrorEnvelope::from(ApiError::from(error).with_detail("provider", provider.as_str()))
        })?;
        let url = self.protocol.request_url(endpoint, &target, &request)?;
        let messages = self.protocol.transform_messages(&request);
        let headers = self.protocol.build_headers(&target, &request)?;
        let body = self.protocol.build_request_body(&target, &request, messages);

        let reply = self
            .http
            .post_json(ctx, url, headers, &body)
            .await
            .map_err(|error| transport_failure(&provider, error))?;

        if !reply.is_success() {
            let message = describe_http_error(&provider, reply.status, &reply.body);
            return Err(ApiError::http_status(&provider, reply.status.as_u16(), message).into());
        }

        let decoded: Value = serde_json::from_slice(&reply.body).map_err(|error| {
            ApiError::invalid_response(&provider, format!("response body is not JSON: {error}"))
        })?;
        Ok(self.protocol.parse_response(&provider, &decoded)?)
    }
}

impl<P: ChatProtocol> ChatProviderPort for ProtocolAdapter<P> {
    fn protocol(&self) -> ProtocolFamily {
        P::FAMILY
    }

    fn send<'a>(
        &'a self,
        ctx: &'a RequestContext,
        target: ChatTarget,
        request: ChatRequest,
    ) -> BoxFuture<'a, Result<ChatResponse>> {
        Box::pin(self.send_inner(ctx, target, request))
    }
}

/// Adapter for `family` sharing `http` and `endpoints`.
#[must_use]
pub fn adapter_for(
    family: ProtocolFamily,
    http: Arc<TimedHttpClient>,
    endpoints: EndpointValidator,
) -> Arc<dyn ChatProviderPort> {
    match family {
        ProtocolFamily::OpenAi => Arc::new(ProtocolAdapter::new(OpenAiProtocol, http, endpoints)),
        ProtocolFamily::Anthropic => {
            Arc::new(ProtocolAdapter::new(AnthropicProtocol, http, endpoints))
        },
        ProtocolFamily::Gemini => Arc::new(ProtocolAdapter::new(GeminiProtocol, http, endpoints)),
        ProtocolFamily::Custom => Arc::new(ProtocolAdapter::new(CustomProtocol, http, endpoints)),
    }
}

fn transport_failure(provider: &ProviderId, error: TransportError) -> ErrorEnvelope {
    match error {
        TransportError::TimedOut { after } => ApiError::timeout(provider, after.as_millis()).into(),
        TransportError::Cancelled => ErrorEnvelope::cancelled("chat request cancelled")
            .with_metadata("operation", OPERATION)
            .with_metadata("provider", provider.as_str()),
        TransportError::Connect { message } | TransportError::Request { message } => {
            ApiError::network(provider, message).into()
        },
    }
}

/// Best-effort message for a non-2xx body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; anything else falls back to the status line.
fn describe_http_error(provider: &ProviderId, status: StatusCode, body: &[u8]) -> String {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .or_else(|| value.get("error").and_then(Value::as_str))
                .or_else(|| value.get("message").and_then(Value::as_str))
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_owned)
        });

    match detail {
        Some(detail) => format!("{provider} returned HTTP {}: {detail}", status.as_u16()),
        None => format!(
            "{provider} returned HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .trim_end()
        .to_owned(),
    }
}

/// Headers every protocol sends.
fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Insert `value` under `name`, marked sensitive.
fn insert_secret_header(
    headers: &mut HeaderMap,
    provider: &ProviderId,
    name: &str,
    value: &str,
) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
        ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "auth header name is not a valid HTTP header name",
        )
        .with_metadata("provider", provider.as_str())
    })?;
    let mut value = HeaderValue::from_str(value).map_err(|_| {
        ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            "credential contains invalid header characters",
        )
        .with_metadata("provider", provider.as_str())
    })?;
    value.set_sensitive(true);
    headers.insert(name, value);
    Ok(())
}

fn bearer_headers(provider: &ProviderId, credential: &SecretString) -> Result<HeaderMap> {
    let mut headers = json_headers();
    insert_secret_header(
        &mut headers,
        provider,
        "authorization",
        &format!("Bearer {}", credential.expose()),
    )?;
    Ok(headers)
}

/// Append `name=credential` to the query string.
fn with_query_credential(mut url: Url, name: &str, credential: &SecretString) -> Url {
    url.query_pairs_mut().append_pair(name, credential.expose());
    url
}

/// Concatenated `text` of `items`; items without a `text` key are skipped.
///
/// A `text` that is present but not a string breaks the documented shape.
fn join_text<'a>(
    provider: &ProviderId,
    items: impl IntoIterator<Item = &'a Value>,
    shape: &str,
) -> std::result::Result<String, ApiError> {
    let mut joined = String::new();
    for item in items {
        match item.get("text") {
            None => {},
            Some(Value::String(text)) => joined.push_str(text),
            Some(_) => {
                return Err(ApiError::invalid_response(
                    provider,
                    format!("`{shape}.text` is not a string"),
                ));
            },
        }
    }
    Ok(joined)
}

/// Non-negative integer at `pointer`, if present.
fn count_at(value: &Value, pointer: &str) -> Option<u64> {
    value.pointer(pointer).and_then(Value::as_u64)
}
