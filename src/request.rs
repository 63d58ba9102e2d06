//! Incoming-request facade.
//!
//! Wire-level parsing belongs to the transport, not to this crate. The
//! context only needs a *read capability* over the request that already
//! arrived: method, target, headers, body, and the endpoints of the
//! underlying stream. Implement [`HttpRequest`] for your transport's parsed
//! request type and the context works with it unchanged.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};

/// Read capability over an incoming HTTP request.
pub trait HttpRequest: Send + Sync {
    fn method(&self) -> &Method;

    fn uri(&self) -> &Uri;

    fn version(&self) -> Version;

    fn headers(&self) -> &HeaderMap;

    /// The request body, fully buffered by the transport.
    fn body(&self) -> &Bytes;

    /// The local endpoint the request arrived on.
    fn local_addr(&self) -> SocketAddr;

    /// The peer that sent the request.
    fn remote_addr(&self) -> SocketAddr;

    /// Case-insensitive header lookup. `None` when the header is missing or
    /// its value is not valid UTF-8.
    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// The path component of the request target.
    fn path(&self) -> &str {
        self.uri().path()
    }
}
