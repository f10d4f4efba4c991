//! Chat dispatch use-case.

use polychat_domain::{
    ApiError, AuthScheme, ChatRequest, ChatResponse, ProtocolFamily, ProviderDescriptor,
    ProviderId,
};
use polychat_ports::{BoxFuture, ChatProviderPort, ChatTarget, LogFields, LoggerPort, log_fields};
use polychat_shared::{ErrorEnvelope, RequestContext, Result, redact_url};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Everything needed to reach one provider.
#[derive(Clone)]
pub struct ProviderRoute {
    /// Protocol adapter.
    pub adapter: Arc<dyn ChatProviderPort>,
    /// Default chat-completion endpoint.
    pub endpoint: String,
    /// Model used when the request names none.
    pub default_model: String,
    /// Credential presentation.
    pub auth: AuthScheme,
}

impl ProviderRoute {
    /// Route built from a catalog entry.
    #[must_use]
    pub fn from_descriptor(
        descriptor: &ProviderDescriptor,
        adapter: Arc<dyn ChatProviderPort>,
    ) -> Self {
        Self {
            adapter,
            endpoint: descriptor.endpoint.clone(),
            default_model: descriptor.default_model.clone(),
            auth: descriptor.auth.clone(),
        }
    }

    /// Protocol family of the adapter.
    #[must_use]
    pub fn protocol(&self) -> ProtocolFamily {
        self.adapter.protocol()
    }
}

impl fmt::Debug for ProviderRoute {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ProviderRoute")
            .field("protocol", &self.protocol())
            .field("endpoint", &redact_url(&self.endpoint))
            .field("default_model", &self.default_model)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Dispatch table keyed by provider id.
#[derive(Default)]
pub struct ChatDispatcher {
    routes: BTreeMap<ProviderId, ProviderRoute>,
    logger: Option<Arc<dyn LoggerPort>>,
}

impl ChatDispatcher {
    /// Empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LoggerPort>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Register or replace the route for `provider`.
    pub fn register(&mut self, provider: ProviderId, route: ProviderRoute) -> Option<ProviderRoute> {
        self.routes.insert(provider, route)
    }

    /// Returns true when `provider` has a route.
    #[must_use]
    pub fn supports(&self, provider: &ProviderId) -> bool {
        self.routes.contains_key(provider)
    }

    /// Registered routes in id order.
    pub fn routes(&self) -> impl Iterator<Item = (&ProviderId, &ProviderRoute)> {
        self.routes.iter()
    }

    /// Resolve the adapter and wire target for `request`.
    ///
    /// The endpoint is the request override when present, else the route
    /// default; the model likewise.
    pub fn resolve(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<(Arc<dyn ChatProviderPort>, ChatTarget), ApiError> {
        let route = self
            .routes
            .get(&request.provider)
            .ok_or_else(|| ApiError::unsupported_provider(request.provider.as_str()))?;

        let endpoint = request
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or(route.endpoint.as_str());
        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(route.default_model.as_str());

        let target = ChatTarget::new(endpoint, model).with_auth(route.auth.clone());
        Ok((Arc::clone(&route.adapter), target))
    }

    /// Start a send. Unknown providers fail here, before any I/O.
    pub fn dispatch<'a>(
        &'a self,
        ctx: &'a RequestContext,
        request: ChatRequest,
    ) -> Result<BoxFuture<'a, Result<ChatResponse>>> {
        let (adapter, target) = match self.resolve(&request) {
            Ok(resolved) => resolved,
            Err(error) => {
                let error = ErrorEnvelope::from(error);
                if let Some(logger) = self.logger.as_ref() {
                    logger.warn_error(
                        "chat.send.unsupported",
                        &error,
                        Some(log_fields([
                            ("provider", json!(request.provider.as_str())),
                            ("correlationId", json!(ctx.correlation_id().as_str())),
                        ])),
                    );
                }
                return Err(error);
            },
        };

        let fields = send_fields(ctx, &request, &target, adapter.protocol());
        if let Some(logger) = self.logger.as_ref() {
            logger.info("chat.send.start", "Chat send started", Some(fields.clone()));
        }

        let logger = self.logger.clone();
        Ok(Box::pin(async move {
            let started_at = Instant::now();
            let result = adapter.send(ctx, target, request).await;
            if let Some(logger) = logger.as_ref() {
                log_finished(logger.as_ref(), fields, started_at, &result);
            }
            result
        }))
    }

    /// Resolve and send `request`.
    #[tracing::instrument(skip_all, fields(provider = request.provider.as_str()))]
    pub async fn send(&self, ctx: &RequestContext, request: ChatRequest) -> Result<ChatResponse> {
        self.dispatch(ctx, request)?.await
    }
}

impl fmt::Debug for ChatDispatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ChatDispatcher")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

fn send_fields(
    ctx: &RequestContext,
    request: &ChatRequest,
    target: &ChatTarget,
    protocol: ProtocolFamily,
) -> LogFields {
    log_fields([
        ("correlationId", json!(ctx.correlation_id().as_str())),
        ("provider", json!(request.provider.as_str())),
        ("protocol", json!(protocol.as_str())),
        ("model", json!(&*target.model)),
        ("endpoint", json!(redact_url(&target.endpoint))),
        ("messages", json!(request.messages.len())),
    ])
}

fn log_finished(
    logger: &dyn LoggerPort,
    mut fields: LogFields,
    started_at: Instant,
    result: &Result<ChatResponse>,
) {
    let duration_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    fields.insert("durationMs".into(), json!(duration_ms));
    match result {
        Ok(response) => {
            fields.insert("totalTokens".into(), json!(response.usage.total_tokens));
            logger.info("chat.send.completed", "Chat send completed", Some(fields));
        },
        Err(error) if error.is_cancelled() => {
            logger.info("chat.send.aborted", "Chat send aborted", Some(fields));
        },
        Err(error) => {
            logger.warn_error("chat.send.failed", error, Some(fields));
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polychat_adapters::{JsonLogger, MemoryLogSink};
    use polychat_domain::{ApiErrorCode, ChatMessage, TokenUsage};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAdapter {
        targets: Mutex<Vec<ChatTarget>>,
        fail_with: Option<ApiErrorCode>,
    }

    impl RecordingAdapter {
        fn targets(&self) -> Vec<ChatTarget> {
            self.targets
                .lock()
                .map(|guard| guard.clone())
                .unwrap_or_default()
        }
    }

    impl ChatProviderPort for RecordingAdapter {
        fn protocol(&self) -> ProtocolFamily {
            ProtocolFamily::OpenAi
        }

        fn send<'a>(
            &'a self,
            _ctx: &'a RequestContext,
            target: ChatTarget,
            request: ChatRequest,
        ) -> BoxFuture<'a, Result<ChatResponse>> {
            if let Ok(mut guard) = self.targets.lock() {
                guard.push(target.clone());
            }
            let result: Result<ChatResponse> = match self.fail_with {
                Some(code) => Err(ApiError::new(code, "provider failed").into()),
                None => Ok(ChatResponse {
                    content: format!("echo from {} via {}", request.provider, target.model),
                    model: Some(target.model.to_string()),
                    usage: TokenUsage::from_counts(Some(3), Some(4), None),
                }),
            };
            Box::pin(async move { result })
        }
    }

    fn provider(id: &str) -> ProviderId {
        ProviderId::parse(id).expect("provider id")
    }

    fn request(id: &str) -> ChatRequest {
        ChatRequest::new(
            provider(id),
            "example", // pragma: allowlist secret
            vec![ChatMessage::user("hi")],
        )
    }

    fn dispatcher_with(adapter: Arc<RecordingAdapter>) -> ChatDispatcher {
        let mut dispatcher = ChatDispatcher::new();
        dispatcher.register(
            provider("deepseek"),
            ProviderRoute {
                adapter,
                endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
                default_model: "deepseek-chat".to_string(),
                auth: AuthScheme::Bearer,
            },
        );
        dispatcher
    }

    #[test]
    fn unknown_provider_fails_before_any_io() {
        let adapter = Arc::new(RecordingAdapter::default());
        let dispatcher = dispatcher_with(adapter.clone());
        let ctx = RequestContext::new_request();

        let error = dispatcher
            .dispatch(&ctx, request("nonexistent"))
            .err()
            .expect("unsupported provider");

        let api = ApiError::from_envelope(&error).expect("provider error");
        assert_eq!(api.code, ApiErrorCode::UnsupportedProvider);
        assert_eq!(api.details.get("provider").map(String::as_str), Some("nonexistent"));
        assert!(adapter.targets().is_empty());
    }

    #[tokio::test]
    async fn defaults_apply_when_request_has_no_overrides() -> Result<()> {
        let adapter = Arc::new(RecordingAdapter::default());
        let dispatcher = dispatcher_with(adapter.clone());

        let response = dispatcher
            .send(&RequestContext::new_request(), request("deepseek"))
            .await?;

        assert_eq!(response.content, "echo from deepseek via deepseek-chat");
        assert_eq!(
            adapter.targets(),
            vec![ChatTarget::new(
                "https://api.deepseek.com/v1/chat/completions",
                "deepseek-chat"
            )]
        );
        Ok(())
    }

    #[tokio::test]
    async fn request_overrides_win() -> Result<()> {
        let adapter = Arc::new(RecordingAdapter::default());
        let dispatcher = dispatcher_with(adapter.clone());
        let request = request("deepseek")
            .with_endpoint("https://proxy.example.com/v1/chat/completions")
            .with_model("deepseek-reasoner");

        dispatcher
            .send(&RequestContext::new_request(), request)
            .await?;

        let targets = adapter.targets();
        assert_eq!(
            targets[0].endpoint.as_ref(),
            "https://proxy.example.com/v1/chat/completions"
        );
        assert_eq!(targets[0].model.as_ref(), "deepseek-reasoner");
        Ok(())
    }

    #[test]
    fn blank_overrides_fall_back_to_defaults() {
        let dispatcher = dispatcher_with(Arc::new(RecordingAdapter::default()));
        let request = request("deepseek").with_endpoint("  ").with_model("");

        let (_, target) = dispatcher.resolve(&request).expect("route");
        assert_eq!(
            target.endpoint.as_ref(),
            "https://api.deepseek.com/v1/chat/completions"
        );
        assert_eq!(target.model.as_ref(), "deepseek-chat");
    }

    #[test]
    fn route_auth_reaches_the_target() {
        let mut dispatcher = ChatDispatcher::new();
        let auth = AuthScheme::Header {
            name: "x-llm-token".to_string(),
        };
        dispatcher.register(
            provider("custom"),
            ProviderRoute {
                adapter: Arc::new(RecordingAdapter::default()),
                endpoint: "https://llm.example.com/v1/chat/completions".to_string(),
                default_model: "default".to_string(),
                auth: auth.clone(),
            },
        );

        let (_, target) = dispatcher.resolve(&request("custom")).expect("route");
        assert_eq!(target.auth, auth);
    }

    #[tokio::test]
    async fn adapter_failures_surface_and_are_logged() {
        let adapter = Arc::new(RecordingAdapter {
            fail_with: Some(ApiErrorCode::EmptyResponse),
            ..RecordingAdapter::default()
        });
        let sink = Arc::new(MemoryLogSink::default());
        let dispatcher =
            dispatcher_with(adapter).with_logger(Arc::new(JsonLogger::new(sink.clone())));

        let error = dispatcher
            .send(&RequestContext::new_request(), request("deepseek"))
            .await
            .expect_err("adapter failure");
        assert_eq!(
            ApiError::from_envelope(&error).map(|api| api.code),
            Some(ApiErrorCode::EmptyResponse)
        );

        let events: Vec<String> = sink
            .take_json()
            .iter()
            .filter_map(|line| line["event"].as_str().map(str::to_string))
            .collect();
        assert_eq!(events, vec!["chat.send.start", "chat.send.failed"]);
    }

    #[tokio::test]
    async fn completion_log_never_carries_the_credential() -> Result<()> {
        let sink = Arc::new(MemoryLogSink::default());
        let dispatcher = dispatcher_with(Arc::new(RecordingAdapter::default()))
            .with_logger(Arc::new(JsonLogger::new(sink.clone())));

        dispatcher
            .send(&RequestContext::new_request(), request("deepseek"))
            .await?;

        let lines = sink.take();
        assert!(lines.iter().all(|line| !line.contains("example")));
        assert!(lines.iter().any(|line| line.contains("chat.send.completed")));
        Ok(())
    }

    #[tokio::test]
    async fn send_lines_share_the_request_correlation_id() -> Result<()> {
        let sink = Arc::new(MemoryLogSink::default());
        let dispatcher = dispatcher_with(Arc::new(RecordingAdapter::default()))
            .with_logger(Arc::new(JsonLogger::new(sink.clone())));
        let ctx = RequestContext::new_request();

        dispatcher.send(&ctx, request("deepseek")).await?;

        let ids: Vec<String> = sink
            .take_json()
            .iter()
            .filter_map(|line| line["fields"]["correlationId"].as_str().map(str::to_string))
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id == ctx.correlation_id().as_str()));
        Ok(())
    }
}
