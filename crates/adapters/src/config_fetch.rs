//! Remote configuration fetch over HTTP.

use crate::http::TimedHttpClient;
use polychat_domain::{ApiError, ApiErrorCode, EndpointValidator};
use polychat_ports::{BoxFuture, ConfigFetchPort};
use polychat_shared::{ErrorEnvelope, RequestContext, Result, redact_url};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::sync::Arc;

const OPERATION: &str = "config.fetch";

/// GETs configuration documents with `Accept: application/json`.
#[derive(Debug, Clone)]
pub struct HttpConfigFetcher {
    http: Arc<TimedHttpClient>,
    endpoints: EndpointValidator,
}

impl HttpConfigFetcher {
    /// Create a fetcher sharing `http`.
    #[must_use]
    pub const fn new(http: Arc<TimedHttpClient>, endpoints: EndpointValidator) -> Self {
        Self { http, endpoints }
    }

    async fn fetch_inner(&self, ctx: &RequestContext, raw_url: &str) -> Result<String> {
        ctx.ensure_not_cancelled(OPERATION)?;
        let url = self.endpoints.validate(raw_url).map_err(|error| {
            ErrorEnvelope::from(ApiError::from(error)).with_metadata("url", redact_url(raw_url))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let reply = self.http.get(ctx, url, headers).await.map_err(|error| {
            error
                .into_envelope(OPERATION)
                .with_metadata("url", redact_url(raw_url))
        })?;

        if !reply.is_success() {
            let status = reply.status.as_u16();
            return Err(ErrorEnvelope::from(
                ApiError::new(
                    ApiErrorCode::ApiError,
                    format!("config fetch returned HTTP {status}"),
                )
                .with_detail("status", status.to_string()),
            )
            .with_metadata("url", redact_url(raw_url)));
        }

        String::from_utf8(reply.body).map_err(|_| {
            ErrorEnvelope::from(ApiError::new(
                ApiErrorCode::InvalidResponse,
                "config document is not valid UTF-8",
            ))
            .with_metadata("url", redact_url(raw_url))
        })
    }
}

impl ConfigFetchPort for HttpConfigFetcher {
    fn fetch<'a>(&'a self, ctx: &'a RequestContext, url: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.fetch_inner(ctx, url))
    }
}
