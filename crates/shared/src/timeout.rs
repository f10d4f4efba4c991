//! Deadline helpers with cancellation awareness.

use crate::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext};
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Why a guarded future did not finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The deadline elapsed; the future was dropped.
    TimedOut {
        /// Budget that was exceeded.
        after: Duration,
    },
    /// The request context was cancelled; the future was dropped.
    Cancelled,
}

impl Interrupted {
    /// Convert into the generic core envelope.
    #[must_use]
    pub fn into_envelope(self, operation: &'static str) -> ErrorEnvelope {
        match self {
            Self::TimedOut { after } => ErrorEnvelope::unexpected(
                ErrorCode::timeout(),
                format!("operation timed out: {operation}"),
                ErrorClass::Retriable,
            )
            .with_metadata("operation", operation)
            .with_metadata("timeoutMs", after.as_millis().to_string()),
            Self::Cancelled => {
                ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
            },
        }
    }
}

impl fmt::Display for Interrupted {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut { after } => {
                write!(formatter, "timed out after {}ms", after.as_millis())
            },
            Self::Cancelled => formatter.write_str("cancelled"),
        }
    }
}

/// Race `fut` against `timeout` and the context's cancellation.
///
/// The losing future is dropped, which closes any connection it owns.
pub async fn race_with_deadline<T, F>(
    ctx: &RequestContext,
    timeout: Duration,
    fut: F,
) -> Result<T, Interrupted>
where
    F: Future<Output = T>,
{
    if ctx.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }

    tokio::select! {
        () = ctx.cancelled() => Err(Interrupted::Cancelled),
        res = tokio::time::timeout(timeout, fut) => {
            res.map_err(|_| Interrupted::TimedOut { after: timeout })
        }
    }
}
