//! The connection a context was accepted on.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::BoxError;
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::ws::WebSocket;

/// A heap-allocated, type-erased future.
///
/// Trait objects cannot have `async fn` methods directly, so the one async
/// operation on [`Connection`] returns its future boxed. `Send + 'static`
/// let the runtime move it across threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Tuning knobs threaded into the handshake-accept operation.
#[derive(Clone, Copy, Debug)]
pub struct UpgradeOptions {
    /// Receive buffer size, in bytes, for the socket the handshake
    /// establishes.
    pub receive_buffer_size: usize,
    /// Interval at which the established socket sends keep-alive pings.
    pub keep_alive_interval: Duration,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            receive_buffer_size: 8 * 1024,
            keep_alive_interval: Duration::from_secs(30),
        }
    }
}

/// The transport-side collaborator behind a context.
///
/// A context holds a shared handle to its connection but never manages the
/// socket's lifetime: accepting, closing, and reusing the connection stay
/// with the server loop that produced it. The context only asks it for the
/// request/response facades at construction time and, on demand, for a
/// WebSocket handshake.
pub trait Connection: Send + Sync {
    /// Builds the read facade over the request that arrived on this
    /// connection. Called exactly once, by
    /// [`HttpContext::new`](crate::HttpContext::new).
    fn open_request(&self) -> Box<dyn HttpRequest>;

    /// Builds the write facade over the response stream. Called exactly
    /// once, by [`HttpContext::new`](crate::HttpContext::new).
    fn open_response(&self) -> Box<dyn HttpResponse>;

    /// Performs the WebSocket handshake on this connection, committing to
    /// `accepted_protocol` when one was negotiated. Resolves once the
    /// handshake bytes are on the wire and the socket is established.
    fn accept_websocket(
        &self,
        accepted_protocol: Option<&str>,
        options: UpgradeOptions,
    ) -> BoxFuture<Result<Box<dyn WebSocket>, BoxError>>;
}
