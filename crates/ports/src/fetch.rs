//! Remote configuration retrieval contract.

use crate::BoxFuture;
use polychat_shared::{RequestContext, Result};

/// Boundary contract for fetching a remote configuration document.
pub trait ConfigFetchPort: Send + Sync {
    /// GET `url` and return the body of a 2xx response.
    ///
    /// Implementations validate the endpoint before any network attempt and
    /// treat non-2xx statuses as errors.
    fn fetch<'a>(&'a self, ctx: &'a RequestContext, url: &'a str) -> BoxFuture<'a, Result<String>>;
}
