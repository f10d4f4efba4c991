//! Timed HTTP client shared by the chat and config adapters.
//!
//! Every exchange (send plus full body read) runs under one deadline and the
//! request context's cancellation. The losing future is dropped, which
//! closes the underlying connection.

use polychat_domain::{ApiError, ApiErrorCode};
use polychat_shared::{
    ErrorClass, ErrorCode, ErrorEnvelope, Interrupted, RequestContext, Result, race_with_deadline,
};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Budget applied when settings do not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Response status.
    pub status: StatusCode,
    /// Fully read body.
    pub body: Vec<u8>,
}

impl HttpReply {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Failure before a status and body were both received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The deadline elapsed and the connection was dropped.
    TimedOut {
        /// Budget that was exceeded.
        after: Duration,
    },
    /// The request context was cancelled.
    Cancelled,
    /// No connection could be established.
    Connect {
        /// Transport diagnostic (URL stripped).
        message: String,
    },
    /// Any other transport failure.
    Request {
        /// Transport diagnostic (URL stripped).
        message: String,
    },
}

impl TransportError {
    /// Convert into a `provider` envelope tagged with `operation`.
    #[must_use]
    pub fn into_envelope(self, operation: &'static str) -> ErrorEnvelope {
        match self {
            Self::TimedOut { after } => {
                let timeout_ms = after.as_millis();
                ErrorEnvelope::from(
                    ApiError::new(
                        ApiErrorCode::RequestTimeout,
                        format!("request did not complete within {timeout_ms}ms"),
                    )
                    .with_detail("timeoutMs", timeout_ms.to_string()),
                )
                .with_metadata("operation", operation)
            },
            Self::Cancelled => Interrupted::Cancelled.into_envelope(operation),
            Self::Connect { message } | Self::Request { message } => {
                ErrorEnvelope::from(ApiError::new(ApiErrorCode::NetworkFailure, message))
                    .with_metadata("operation", operation)
            },
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut { after } => {
                write!(formatter, "timed out after {}ms", after.as_millis())
            },
            Self::Cancelled => formatter.write_str("cancelled"),
            Self::Connect { message } | Self::Request { message } => formatter.write_str(message),
        }
    }
}

impl std::error::Error for TransportError {}

/// `reqwest` client with a per-exchange deadline.
#[derive(Debug, Clone)]
pub struct TimedHttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl TimedHttpClient {
    /// Build a client with the given per-exchange budget.
    pub fn new(timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "timeout must be greater than zero",
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("polychat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::new("http", "client_init_failed"),
                    format!("failed to build HTTP client: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;

        Ok(Self { client, timeout })
    }

    /// Budget applied to every exchange.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `body` as JSON and read the full response.
    pub async fn post_json<B>(
        &self,
        ctx: &RequestContext,
        url: Url,
        headers: HeaderMap,
        body: &B,
    ) -> std::result::Result<HttpReply, TransportError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let request = self.client.post(url).headers(headers).json(body);
        self.execute(ctx, request).await
    }

    /// GET `url` and read the full response.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        url: Url,
        headers: HeaderMap,
    ) -> std::result::Result<HttpReply, TransportError> {
        let request = self.client.get(url).headers(headers);
        self.execute(ctx, request).await
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<HttpReply, TransportError> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(HttpReply {
                status,
                body: body.to_vec(),
            })
        };

        match race_with_deadline(ctx, self.timeout, exchange).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(error)) => Err(map_reqwest_error(error, self.timeout)),
            Err(Interrupted::TimedOut { after }) => Err(TransportError::TimedOut { after }),
            Err(Interrupted::Cancelled) => Err(TransportError::Cancelled),
        }
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    // Query strings may carry credentials.
    let error = error.without_url();
    if error.is_timeout() {
        return TransportError::TimedOut { after: timeout };
    }
    if error.is_connect() {
        return TransportError::Connect {
            message: format!("connection failed: {error}"),
        };
    }
    TransportError::Request {
        message: format!("request failed: {error}"),
    }
}
