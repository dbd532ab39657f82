//! 传输层抽象 Trait

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{Request, ServerDocument};

/// Transport trait — the only boundary between the core and the backend.
///
/// Platform implementations:
/// - `pki-console-http`: `HttpTransport` (reqwest, GET for queries and
///   form-encoded POST for action requests)
/// - tests: `MockTransport` (scripted responses)
///
/// A failing [`send`](Self::send) is recovered by the session controller:
/// the calling flow always completes with a (possibly empty) document and a
/// status banner, never an unhandled error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the structured document the backend
    /// answered with.
    async fn send(&self, request: &Request) -> CoreResult<ServerDocument>;

    /// Fire-and-forget GET against a bare href, outside the request
    /// protocol. Used by the keep-alive ping timer; the response body is
    /// discarded.
    async fn ping(&self, href: &str) -> CoreResult<()>;
}
