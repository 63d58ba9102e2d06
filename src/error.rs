//! Unified error type.

use thiserror::Error as ThisError;

/// A type-erased error, as produced by close callbacks and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type returned by nidus's fallible operations.
///
/// Handler-level failures (404, 500, …) are HTTP responses, not `Error`s.
/// This type covers the context's own failure modes: registering teardown
/// on a closed context, and the two ways a WebSocket handshake can fail.
/// Errors raised *by* close callbacks never appear here — they are contained
/// inside [`close`](crate::HttpContext::close) and logged, not surfaced.
#[derive(Debug, ThisError)]
pub enum Error {
    /// [`on_close`](crate::HttpContext::on_close) was called after
    /// [`close`](crate::HttpContext::close) had already run.
    #[error("HTTP context {id} has already been closed")]
    ClosedContext {
        /// Id of the offending context, for log correlation.
        id: String,
    },

    /// The WebSocket handshake was cancelled before it completed.
    #[error("WebSocket handshake cancelled")]
    Cancelled,

    /// The transport failed during the WebSocket handshake. The underlying
    /// error is carried through uninterpreted.
    #[error("WebSocket handshake failed: {0}")]
    Upgrade(#[source] BoxError),
}
