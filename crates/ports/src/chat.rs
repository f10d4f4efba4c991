//! Chat provider boundary contract.

use crate::BoxFuture;
use polychat_domain::{AuthScheme, ChatRequest, ChatResponse, ProtocolFamily};
use polychat_shared::{RequestContext, Result};

/// Where a request is sent once defaults are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTarget {
    /// Fully resolved chat-completion endpoint.
    pub endpoint: Box<str>,
    /// Model identifier sent on the wire.
    pub model: Box<str>,
    /// Credential presentation from the catalog. Families with a fixed
    /// convention ignore it.
    pub auth: AuthScheme,
}

impl ChatTarget {
    /// Build a target.
    pub fn new(endpoint: impl Into<Box<str>>, model: impl Into<Box<str>>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            auth: AuthScheme::default(),
        }
    }

    /// Set the credential presentation.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }
}

/// Boundary contract for one chat-completion protocol family.
///
/// Implementations never retry. Failures carry a `provider` namespace
/// error code (see `polychat_domain::ApiErrorCode`).
pub trait ChatProviderPort: Send + Sync {
    /// Protocol family implemented by this adapter.
    fn protocol(&self) -> ProtocolFamily;

    /// Send one request and return the normalized response.
    fn send<'a>(
        &'a self,
        ctx: &'a RequestContext,
        target: ChatTarget,
        request: ChatRequest,
    ) -> BoxFuture<'a, Result<ChatResponse>>;
}
