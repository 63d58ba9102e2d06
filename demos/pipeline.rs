//! A tour of the request pipeline around [`HttpContext`], against an
//! in-memory transport: route, authenticate, handle, upgrade, tear down.
//!
//! Run with: `cargo run --example pipeline`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use nidus::{
    BoxError, BoxFuture, CancellationToken, Connection, HttpContext, HttpRequest, HttpResponse,
    MimeTypeProvider, Principal, RouteMatch, UpgradeOptions, WebSocket,
};
use tracing::info;

// ── A toy transport ──────────────────────────────────────────────────────────

struct DemoRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpRequest for DemoRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn version(&self) -> Version {
        Version::HTTP_11
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn body(&self) -> &Bytes {
        &self.body
    }

    fn local_addr(&self) -> SocketAddr {
        "127.0.0.1:3000".parse().unwrap()
    }

    fn remote_addr(&self) -> SocketAddr {
        "127.0.0.1:52801".parse().unwrap()
    }
}

struct DemoResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl HttpResponse for DemoResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write(&mut self, chunk: Bytes) {
        self.body.extend_from_slice(&chunk);
    }

    fn close(&mut self) {
        info!(
            status = %self.status,
            bytes = self.body.len(),
            "response finalized"
        );
    }
}

struct DemoSocket;

impl WebSocket for DemoSocket {
    fn as_any(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

struct DemoConnection;

impl Connection for DemoConnection {
    fn open_request(&self) -> Box<dyn HttpRequest> {
        Box::new(DemoRequest {
            method: Method::GET,
            uri: "/users/42".parse().unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
    }

    fn open_response(&self) -> Box<dyn HttpResponse> {
        Box::new(DemoResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        })
    }

    fn accept_websocket(
        &self,
        accepted_protocol: Option<&str>,
        _options: UpgradeOptions,
    ) -> BoxFuture<Result<Box<dyn WebSocket>, BoxError>> {
        info!(protocol = accepted_protocol.unwrap_or("-"), "handshake accepted");
        Box::pin(async { Ok::<_, BoxError>(Box::new(DemoSocket) as Box<dyn WebSocket>) })
    }
}

// ── A MIME provider ──────────────────────────────────────────────────────────

struct WebAssets;

impl MimeTypeProvider for WebAssets {
    fn mime_type(&self, extension: &str) -> Option<String> {
        match extension {
            "html" => Some("text/html; charset=utf-8".into()),
            "css" => Some("text/css".into()),
            "png" => Some("image/png".into()),
            _ => None,
        }
    }

    fn prefer_compression(&self, mime_type: &str) -> Option<bool> {
        match mime_type {
            m if m.starts_with("text/") => Some(true),
            m if m.starts_with("image/") => Some(false),
            _ => None,
        }
    }
}

// ── The pipeline ─────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt().init();

    // The server loop accepts a connection and builds the context.
    let mut ctx = HttpContext::new(Arc::new(DemoConnection));
    info!(id = %ctx.id(), peer = %ctx.remote_addr(), "request accepted");

    // Router stage.
    let params = [("id".to_string(), "42".to_string())].into_iter().collect();
    ctx.set_route(RouteMatch::new("/42", params));

    // Auth stage.
    ctx.set_user(Principal::with_auth_type("alice", "Basic"));

    // MIME registration, e.g. by a static-files stage.
    ctx.push_mime_type_provider(Arc::new(WebAssets));
    info!(
        mime = ctx.get_mime_type("html").as_deref().unwrap_or("?"),
        compression = ?ctx.try_determine_compression("text/css"),
        "mime chain answers"
    );

    // Handler stage: leave a note for teardown, register teardown, upgrade.
    ctx.items().insert("audit", "GET /users/42 by alice".to_string());

    ctx.on_close(|ctx| {
        let audit = ctx.items().get::<String>("audit");
        info!(id = %ctx.id(), ?audit, "audit drained");
        Ok(())
    })
    .expect("context is still open");

    // One misbehaving callback; its failure will be logged and contained.
    ctx.on_close(|_| Err("flaky cache eviction".into()))
        .expect("context is still open");

    let ws = ctx
        .accept_websocket(
            vec!["chat".into()],
            Some("chat".into()),
            8 * 1024,
            Duration::from_secs(30),
            CancellationToken::new(),
        )
        .await
        .expect("demo handshake always succeeds");
    info!(
        version = ws.version(),
        protocol = ws.accepted_protocol().unwrap_or("-"),
        "websocket session established"
    );
    ctx.set_handled();

    // The owning task tears the context down: response first, then the
    // callbacks, newest-first, each fenced against the others.
    ctx.close();
    info!(id = %ctx.id(), age_ms = ctx.age().as_millis() as u64, "done");
}
