//! Outgoing-response facade.
//!
//! The context owns the response for the lifetime of the request and
//! guarantees it is finalized exactly once, before any teardown runs. How
//! the status line, headers, and body reach the wire is the transport's
//! business; implement [`HttpResponse`] over whatever write path it has.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// Write capability over an outgoing HTTP response.
pub trait HttpResponse: Send + Sync {
    fn status(&self) -> StatusCode;

    fn set_status(&mut self, status: StatusCode);

    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Appends `chunk` to the buffered response body.
    fn write(&mut self, chunk: Bytes);

    /// Finalizes the response: status line, headers, and body go out to the
    /// transport and the stream is flushed. Invoked exactly once, by
    /// [`close`](crate::HttpContext::close); a well-behaved implementation
    /// ignores writes arriving after this point.
    fn close(&mut self);
}
