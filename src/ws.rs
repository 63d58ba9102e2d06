//! WebSocket upgrade surface.
//!
//! A context can promote its HTTP exchange to a WebSocket session. Only the
//! handshake lives in this crate; message-level framing after the upgrade is
//! the consuming subsystem's business. What crosses the boundary is a
//! [`WebSocketContext`]: the negotiated protocol facts plus the established
//! socket handle and the cancellation token that governs it.

use std::any::Any;

use tokio_util::sync::CancellationToken;

/// The WebSocket protocol version this core negotiates (RFC 6455).
pub const SUPPORTED_VERSION: &str = "13";

/// The low-level socket established by a completed handshake.
///
/// Send/receive lives in the subsystem that consumes the
/// [`WebSocketContext`]; it reaches its concrete socket type through
/// [`as_any`](WebSocket::as_any).
pub trait WebSocket: Send + Sync {
    fn as_any(&mut self) -> &mut dyn Any;
}

/// The protocol session produced by a successful handshake.
pub struct WebSocketContext {
    version: &'static str,
    requested_protocols: Vec<String>,
    accepted_protocol: Option<String>,
    socket: Box<dyn WebSocket>,
    cancellation: CancellationToken,
}

impl WebSocketContext {
    pub(crate) fn new(
        requested_protocols: Vec<String>,
        accepted_protocol: Option<String>,
        socket: Box<dyn WebSocket>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            version: SUPPORTED_VERSION,
            requested_protocols,
            accepted_protocol,
            socket,
            cancellation,
        }
    }

    /// The negotiated WebSocket protocol version.
    pub fn version(&self) -> &str {
        self.version
    }

    /// The sub-protocols the client asked for, in request order.
    pub fn requested_protocols(&self) -> &[String] {
        &self.requested_protocols
    }

    /// The sub-protocol the handshake committed to, if any.
    pub fn accepted_protocol(&self) -> Option<&str> {
        self.accepted_protocol.as_deref()
    }

    /// The established socket, for the message layer to drive.
    pub fn socket_mut(&mut self) -> &mut dyn WebSocket {
        self.socket.as_mut()
    }

    /// The cancellation token governing message-level operations on this
    /// session — the same token the handler passed to
    /// [`accept_websocket`](crate::HttpContext::accept_websocket).
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}
